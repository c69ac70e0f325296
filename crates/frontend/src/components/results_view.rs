use dioxus::html::input_data::MouseButton;
use dioxus::prelude::*;
use photomoa_shared::models::{AnalysisResult, DistanceUnit, Point};

use crate::api::{HttpClient, ResultSyncClient};
use crate::calibration::CalibrationSession;
use crate::coords::{self, NaturalSize};
use crate::viewer::{ResultViewer, ViewerEvent};

const TARGET_IMAGE_ID: &str = "target-image";

const DETECTED_COLOR: &str = "#22c55e";
const MANUAL_COLOR: &str = "#ff4444";
const CALIBRATION_COLOR: &str = "#8b5cf6";
const SCALE_COLOR: &str = "#facc15";

/// Reference image width the marker sizes are tuned for.
const REFERENCE_WIDTH: f64 = 800.0;

fn format_moa(moa: Option<f64>) -> String {
    match moa {
        Some(v) => format!("{:.2}\"", v),
        None => "N/A".to_string(),
    }
}

fn format_scale(pixels_per_inch: Option<f64>) -> String {
    match pixels_per_inch {
        Some(v) => format!("{:.2} pixels per inch", v),
        None => "unknown".to_string(),
    }
}

fn calibration_message(pixels_per_inch: f64, moa: Option<f64>) -> String {
    format!(
        "Calibration applied: {}, MOA {}",
        format_scale(Some(pixels_per_inch)),
        format_moa(moa)
    )
}

fn manual_submit_label(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("Update MOA with {} Manual Shot{}", count, plural)
}

// ---------------------------------------------------------------------------
// SVG overlay, drawn in native pixel space so it tracks the image at any size
// ---------------------------------------------------------------------------

fn push_marker(svg: &mut String, p: Point, r: f64, color: &str, label: &str, s: f64) {
    let sw = 2.0 * s;
    let fs = 14.0 * s;
    let ty = p.y - r - 4.0 * s;
    let tsw = 3.0 * s;
    let (cx, cy) = (p.x, p.y);
    svg.push_str(&format!(r##"<g role="img"><title>{label}</title>"##));
    svg.push_str(&format!(
        r##"<circle cx="{cx}" cy="{cy}" r="{r}" fill="{color}" fill-opacity="0.3" stroke="{color}" stroke-width="{sw}"/>"##
    ));
    svg.push_str(&format!(
        r##"<text x="{cx}" y="{ty}" fill="{color}" font-size="{fs}" font-family="sans-serif" font-weight="700" text-anchor="middle" stroke="white" stroke-width="{tsw}" paint-order="stroke">{label}</text>"##
    ));
    svg.push_str("</g>");
}

fn build_calibration_line(svg: &mut String, session: &CalibrationSession, s: f64) {
    if let (Some(a), Some(b)) = (session.point1(), session.point2()) {
        let sw = 2.0 * s;
        let dash = 5.0 * s;
        svg.push_str(&format!(
            r##"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{CALIBRATION_COLOR}" stroke-width="{sw}" stroke-dasharray="{dash},{dash}"/>"##,
            a.x, a.y, b.x, b.y
        ));
    }
    for (i, p) in [session.point1(), session.point2()].into_iter().enumerate() {
        if let Some(p) = p {
            push_marker(svg, p, 12.0 * s, CALIBRATION_COLOR, &format!("C{}", i + 1), s);
        }
    }
}

/// One-inch reference bar in the bottom-left corner at the current scale.
fn push_scale_bar(svg: &mut String, natural: NaturalSize, pixels_per_inch: f64, s: f64) {
    if !pixels_per_inch.is_finite() || pixels_per_inch <= 0.0 {
        return;
    }
    let x1 = 20.0 * s;
    let x2 = x1 + pixels_per_inch;
    let y = natural.height - 20.0 * s;
    let tick = 6.0 * s;
    let sw = 3.0 * s;
    let fs = 14.0 * s;
    let (top, bottom) = (y - tick, y + tick);
    let label_x = (x1 + x2) / 2.0;
    let label_y = y - tick - 4.0 * s;
    svg.push_str(r##"<g role="img"><title>1 inch</title>"##);
    svg.push_str(&format!(
        r##"<line x1="{x1}" y1="{y}" x2="{x2}" y2="{y}" stroke="{SCALE_COLOR}" stroke-width="{sw}"/>"##
    ));
    for x in [x1, x2] {
        svg.push_str(&format!(
            r##"<line x1="{x}" y1="{top}" x2="{x}" y2="{bottom}" stroke="{SCALE_COLOR}" stroke-width="{sw}"/>"##
        ));
    }
    svg.push_str(&format!(
        r##"<text x="{label_x}" y="{label_y}" fill="{SCALE_COLOR}" font-size="{fs}" font-family="sans-serif" font-weight="700" text-anchor="middle" stroke="black" stroke-width="{sw}" paint-order="stroke">1 inch</text>"##
    ));
    svg.push_str("</g>");
}

/// Full overlay for the current view state.
///
/// Detected shots are always shown. Manual shots and the calibration line are
/// mutually exclusive since only one edit mode is active at a time.
fn build_overlay_svg(
    natural: NaturalSize,
    detected: &[Point],
    manual: &[Point],
    session: Option<&CalibrationSession>,
    pixels_per_inch: Option<f64>,
) -> String {
    let s = (natural.width / REFERENCE_WIDTH).max(1.0);
    let mut content = String::new();

    if let Some(ppi) = pixels_per_inch {
        push_scale_bar(&mut content, natural, ppi, s);
    }

    for (i, &p) in detected.iter().enumerate() {
        push_marker(&mut content, p, 10.0 * s, DETECTED_COLOR, &format!("{}", i + 1), s);
    }
    match session {
        Some(session) => build_calibration_line(&mut content, session, s),
        None => {
            for (i, &p) in manual.iter().enumerate() {
                push_marker(&mut content, p, 8.0 * s, MANUAL_COLOR, &format!("M{}", i + 1), s);
            }
        }
    }

    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" preserveAspectRatio="none" style="position:absolute;top:0;left:0;width:100%;height:100%;pointer-events:none;z-index:5;">{}</svg>"#,
        natural.width, natural.height, content
    )
}

#[component]
pub fn ResultsView(result: AnalysisResult, on_replaced: EventHandler<AnalysisResult>) -> Element {
    let client = use_context::<HttpClient>();
    let image_url = client.image_url(&result.annotated_image);

    let mut natural = use_signal(|| None::<NaturalSize>);
    let mut notice = use_signal(|| None::<String>);
    let mut confirmation = use_signal(|| None::<String>);

    let mut viewer = use_signal(move || {
        let mut viewer = ResultViewer::new(result);
        viewer.subscribe(move |event| match event {
            ViewerEvent::ResultReplaced(updated) => on_replaced.call(updated.clone()),
            ViewerEvent::Calibrated {
                pixels_per_inch,
                moa_value,
            } => {
                tracing::info!(pixels_per_inch, moa = ?moa_value, "Scale calibrated");
                confirmation.set(Some(calibration_message(*pixels_per_inch, *moa_value)));
            }
        });
        viewer
    });

    let calibration_client = client.clone();
    let submit_calibration = move |_: MouseEvent| {
        let begun = viewer.write().begin_calibration();
        match begun {
            Ok((id, request)) => {
                notice.set(None);
                let client = calibration_client.clone();
                spawn(async move {
                    let outcome = client.calibrate(&id, &request).await;
                    if let Err(e) = viewer.write().finish_calibration(outcome) {
                        tracing::warn!(error = %e, "Calibration submission failed");
                        notice.set(Some(e.to_string()));
                    }
                });
            }
            Err(e) => notice.set(Some(e.to_string())),
        }
    };

    let shots_client = client.clone();
    let submit_shots = move |_: MouseEvent| {
        let begun = viewer.write().begin_shot_update();
        match begun {
            Ok((id, request)) => {
                notice.set(None);
                confirmation.set(None);
                let client = shots_client.clone();
                spawn(async move {
                    let outcome = client.update_shots(&id, &request).await;
                    if let Err(e) = viewer.write().finish_shot_update(outcome) {
                        tracing::warn!(error = %e, "Shot update failed");
                        notice.set(Some(e.to_string()));
                    }
                });
            }
            Err(e) => notice.set(Some(e.to_string())),
        }
    };

    let v = viewer.read();
    let current = v.result().clone();
    let calibrating = v.is_calibrating();
    let session = v.session().clone();
    let manual: Vec<Point> = v.manual_shots().as_slice().to_vec();
    let calibration_pending = v.calibration_pending();
    let shots_pending = v.shots_pending();
    drop(v);

    let overlay = (*natural.read()).map(|n| {
        build_overlay_svg(
            n,
            &current.shots,
            &manual,
            calibrating.then_some(&session),
            current.pixels_per_inch,
        )
    });
    let moa_text = format_moa(current.moa_value);
    let notice_text = notice.read().clone();
    let confirmation_text = confirmation.read().clone();
    let scale_text = format_scale(current.pixels_per_inch);
    let inputs_locked = !session.is_complete() || calibration_pending;
    let distance_value = session.distance_value();
    let unit_value = session.distance_unit().as_str();
    let instructions = session.instructions();
    let status_label = session.status_label();
    let cancel_label = session.cancel_label();
    let manual_count = manual.len();
    let submit_label = manual_submit_label(manual_count);
    let shot_rows: Vec<(usize, String)> = current
        .shots
        .iter()
        .enumerate()
        .map(|(i, p)| (i + 1, format!("({:.1}, {:.1})", p.x, p.y)))
        .collect();

    rsx! {
        div { class: "results",
            div { class: "stats",
                div { class: "stat",
                    h4 { "Shots Detected" }
                    p { class: "stat-value shots", "{current.shot_count}" }
                }
                div { class: "stat",
                    h4 { "MOA Value" }
                    p { class: "stat-value moa", "{moa_text}" }
                }
            }

            if let Some(msg) = notice_text {
                div { class: "notice error", "{msg}" }
            }
            if let Some(msg) = confirmation_text {
                div { class: "notice success", "{msg}" }
            }

            if !calibrating {
                div { class: "panel calibration",
                    h3 { "Scale Calibration" }
                    p { "Calibrate the scale for accurate MOA by selecting two points with a known distance." }
                    p { class: "status", "Current scale: {scale_text}" }
                    button {
                        disabled: shots_pending,
                        onclick: move |_| {
                            confirmation.set(None);
                            if let Err(e) = viewer.write().enter_calibration() {
                                notice.set(Some(e.to_string()));
                            }
                        },
                        "Calibrate Scale"
                    }
                }
            } else {
                div { class: "panel calibration active",
                    h3 { "Scale Calibration Mode" }
                    p { "{instructions}" }
                    div { class: "distance-row",
                        label { "Distance between points:" }
                        input {
                            r#type: "number",
                            step: "0.1",
                            min: "0",
                            value: "{distance_value}",
                            disabled: inputs_locked,
                            oninput: move |evt: Event<FormData>| {
                                if let Ok(v) = evt.value().parse::<f64>() {
                                    if let Err(e) = viewer.write().set_distance(v) {
                                        notice.set(Some(e.to_string()));
                                    }
                                }
                            },
                        }
                        select {
                            value: "{unit_value}",
                            disabled: inputs_locked,
                            onchange: move |evt: Event<FormData>| {
                                if let Ok(unit) = evt.value().parse::<DistanceUnit>() {
                                    if let Err(e) = viewer.write().set_unit(unit) {
                                        notice.set(Some(e.to_string()));
                                    }
                                }
                            },
                            for unit in DistanceUnit::ALL {
                                option {
                                    value: unit.as_str(),
                                    selected: session.distance_unit() == unit,
                                    {unit.as_str()}
                                }
                            }
                        }
                    }
                    div { class: "calibration-actions",
                        span { class: "status", "State: {status_label}" }
                        if session.is_complete() && !calibration_pending {
                            button { class: "apply", onclick: submit_calibration, "Apply Calibration" }
                        }
                        if calibration_pending {
                            span { class: "status", "Applying..." }
                        }
                        button {
                            class: "secondary",
                            disabled: calibration_pending,
                            onclick: move |_| {
                                if let Err(e) = viewer.write().cancel_calibration() {
                                    notice.set(Some(e.to_string()));
                                }
                            },
                            "{cancel_label}"
                        }
                    }
                }
            }

            div { class: "panel target",
                h3 {
                    if calibrating { "Click-Drag-Click to Set Calibration Line" } else { "Annotated Target" }
                }
                if !calibrating {
                    div { class: "manual-help",
                        p { "Manual Shot Selection: click on missed bullet holes to add them." }
                        span { "Manual shots added: {manual_count}" }
                        if !manual.is_empty() && !shots_pending {
                            button {
                                class: "secondary",
                                onclick: move |_| {
                                    if let Err(e) = viewer.write().undo_shot() {
                                        notice.set(Some(e.to_string()));
                                    }
                                },
                                "Undo Last"
                            }
                            button {
                                class: "danger",
                                onclick: move |_| {
                                    if let Err(e) = viewer.write().clear_shots() {
                                        notice.set(Some(e.to_string()));
                                    }
                                },
                                "Clear All"
                            }
                        }
                    }
                }
                div {
                    class: if calibrating && session.is_complete() { "target-container" } else { "target-container crosshair" },
                    onmousedown: move |evt: Event<MouseData>| {
                        if evt.trigger_button() != Some(MouseButton::Primary) {
                            return;
                        }
                        evt.prevent_default();
                        let client = evt.client_coordinates();
                        let Some(p) = coords::pointer_to_native(client.x, client.y, TARGET_IMAGE_ID) else {
                            return;
                        };
                        if let Err(e) = viewer.write().pointer_down(p) {
                            notice.set(Some(e.to_string()));
                        }
                    },
                    onmousemove: move |evt: Event<MouseData>| {
                        if !viewer.read().is_calibrating() {
                            return;
                        }
                        let client = evt.client_coordinates();
                        if let Some(p) = coords::pointer_to_native(client.x, client.y, TARGET_IMAGE_ID) {
                            viewer.write().pointer_move(p);
                        }
                    },
                    img {
                        id: TARGET_IMAGE_ID,
                        src: "{image_url}",
                        alt: "Annotated target with detected shots",
                        draggable: "false",
                        onload: move |_| natural.set(coords::natural_size(TARGET_IMAGE_ID)),
                    }
                    if let Some(svg_html) = overlay {
                        div {
                            dangerous_inner_html: "{svg_html}",
                            style: "position:absolute;top:0;left:0;width:100%;height:100%;pointer-events:none;",
                        }
                    }
                }
                if !manual.is_empty() {
                    div { class: "manual-actions",
                        if shots_pending {
                            span { class: "status", "Updating..." }
                        } else {
                            button { onclick: submit_shots, "{submit_label}" }
                            button {
                                class: "secondary",
                                onclick: move |_| {
                                    if let Err(e) = viewer.write().clear_shots() {
                                        notice.set(Some(e.to_string()));
                                    }
                                },
                                "Cancel"
                            }
                        }
                    }
                }
            }

            if !current.shots.is_empty() {
                div { class: "panel shot-list",
                    h3 { "Shot Positions" }
                    div { class: "shot-grid",
                        for (n, position) in shot_rows {
                            div { class: "shot-row",
                                span { "Shot {n}:" }
                                span { class: "mono", "{position}" }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::PointerEvent;

    const NATURAL: NaturalSize = NaturalSize {
        width: 1600.0,
        height: 1200.0,
    };

    #[test]
    fn test_format_moa() {
        assert_eq!(format_moa(Some(1.3507)), "1.35\"");
        assert_eq!(format_moa(None), "N/A");
    }

    #[test]
    fn test_calibration_message() {
        assert_eq!(
            calibration_message(42.5, Some(1.3507)),
            "Calibration applied: 42.50 pixels per inch, MOA 1.35\""
        );
        assert_eq!(
            calibration_message(10.0, None),
            "Calibration applied: 10.00 pixels per inch, MOA N/A"
        );
    }

    #[test]
    fn test_manual_submit_label() {
        assert_eq!(manual_submit_label(1), "Update MOA with 1 Manual Shot");
        assert_eq!(manual_submit_label(3), "Update MOA with 3 Manual Shots");
    }

    #[test]
    fn test_overlay_viewbox_is_native() {
        let svg = build_overlay_svg(NATURAL, &[], &[], None, None);
        assert!(svg.contains(r#"viewBox="0 0 1600 1200""#));
    }

    #[test]
    fn test_overlay_scale_bar_spans_one_inch() {
        // 1600px wide image: marker scale 2, so the bar starts 40px in
        let svg = build_overlay_svg(NATURAL, &[], &[], None, Some(250.0));
        assert!(svg.contains(r#"x1="40" y1="1160" x2="290" y2="1160""#));
        assert!(svg.contains(">1 inch</text>"));

        let none = build_overlay_svg(NATURAL, &[], &[], None, None);
        assert!(!none.contains("1 inch"));
        let bogus = build_overlay_svg(NATURAL, &[], &[], None, Some(0.0));
        assert!(!bogus.contains("1 inch"));
    }

    #[test]
    fn test_overlay_numbers_shots() {
        let detected = [Point::new(10.0, 20.0), Point::new(30.0, 40.0)];
        let manual = [Point::new(50.0, 60.0)];
        let svg = build_overlay_svg(NATURAL, &detected, &manual, None, None);
        assert!(svg.contains("<title>1</title>"));
        assert!(svg.contains("<title>2</title>"));
        assert!(svg.contains("<title>M1</title>"));
        assert!(svg.contains(r#"cx="50" cy="60""#));
    }

    #[test]
    fn test_overlay_calibration_hides_manual_shots() {
        let mut session = CalibrationSession::default();
        session.handle(PointerEvent::Down(Point::new(0.0, 0.0)));
        session.handle(PointerEvent::Move(Point::new(100.0, 0.0)));
        let manual = [Point::new(50.0, 60.0)];
        let svg = build_overlay_svg(NATURAL, &[], &manual, Some(&session), None);
        assert!(svg.contains("<line"));
        assert!(svg.contains("<title>C1</title>"));
        assert!(svg.contains("<title>C2</title>"));
        assert!(!svg.contains("M1"));
    }

    #[test]
    fn test_overlay_first_point_only() {
        let mut session = CalibrationSession::default();
        session.handle(PointerEvent::Down(Point::new(5.0, 5.0)));
        let svg = build_overlay_svg(NATURAL, &[], &[], Some(&session), None);
        assert!(!svg.contains("<line"));
        assert!(svg.contains("<title>C1</title>"));
        assert!(!svg.contains("C2"));
    }
}
