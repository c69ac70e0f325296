use photomoa_shared::models::Point;
use wasm_bindgen::JsCast;

/// On-screen bounding box of the rendered image element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Intrinsic pixel dimensions of the loaded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaturalSize {
    pub width: f64,
    pub height: f64,
}

fn scale(rendered: RenderedBox, natural: NaturalSize) -> Option<(f64, f64)> {
    if rendered.width <= 0.0
        || rendered.height <= 0.0
        || natural.width <= 0.0
        || natural.height <= 0.0
    {
        return None;
    }
    Some((
        natural.width / rendered.width,
        natural.height / rendered.height,
    ))
}

/// Pure function: convert a pointer position in viewport space to native
/// image pixels. Each axis scales independently since the rendered box may
/// not preserve the aspect ratio.
///
/// Returns `None` before the element is laid out or the image has loaded.
pub fn display_to_native(
    pointer_x: f64,
    pointer_y: f64,
    rendered: RenderedBox,
    natural: NaturalSize,
) -> Option<Point> {
    let (sx, sy) = scale(rendered, natural)?;
    Some(Point::new(
        (pointer_x - rendered.left) * sx,
        (pointer_y - rendered.top) * sy,
    ))
}

/// Inverse of [`display_to_native`].
#[cfg(test)]
pub fn native_to_display(
    point: Point,
    rendered: RenderedBox,
    natural: NaturalSize,
) -> Option<(f64, f64)> {
    let (sx, sy) = scale(rendered, natural)?;
    Some((point.x / sx + rendered.left, point.y / sy + rendered.top))
}

fn image_element(image_id: &str) -> Option<web_sys::HtmlImageElement> {
    let document = web_sys::window()?.document()?;
    document
        .get_element_by_id(image_id)?
        .dyn_into::<web_sys::HtmlImageElement>()
        .ok()
}

/// Intrinsic size of a loaded image, `None` until it has decoded.
pub fn natural_size(image_id: &str) -> Option<NaturalSize> {
    let image = image_element(image_id)?;
    let size = NaturalSize {
        width: image.natural_width() as f64,
        height: image.natural_height() as f64,
    };
    (size.width > 0.0 && size.height > 0.0).then_some(size)
}

/// Map a pointer event to native pixels of the image with `image_id`.
///
/// Layout can change between events (window resize, scrollbars), so the
/// bounding box and natural size are queried fresh on every call.
pub fn pointer_to_native(client_x: f64, client_y: f64, image_id: &str) -> Option<Point> {
    let image = image_element(image_id)?;
    let rect = image.get_bounding_client_rect();

    display_to_native(
        client_x,
        client_y,
        RenderedBox {
            left: rect.left(),
            top: rect.top(),
            width: rect.width(),
            height: rect.height(),
        },
        NaturalSize {
            width: image.natural_width() as f64,
            height: image.natural_height() as f64,
        },
    )
}
