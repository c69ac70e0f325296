use dioxus::prelude::*;
use photomoa_shared::models::AnalysisResult;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::api::HttpClient;

const FILE_INPUT_ID: &str = "target-file-input";

/// The file currently chosen in the upload input, if any.
fn selected_file() -> Option<web_sys::File> {
    let document = web_sys::window()?.document()?;
    let input = document
        .get_element_by_id(FILE_INPUT_ID)?
        .dyn_into::<web_sys::HtmlInputElement>()
        .ok()?;
    input.files()?.get(0)
}

async fn read_file(file: &web_sys::File) -> Result<Vec<u8>, String> {
    let buffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|_| format!("Could not read {}", file.name()))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

async fn upload_selected(client: &HttpClient) -> Result<AnalysisResult, String> {
    let file = selected_file().ok_or_else(|| "Please select an image first".to_string())?;
    let bytes = read_file(&file).await?;
    client
        .upload(file.name(), bytes)
        .await
        .map_err(|e| format!("Upload failed: {}", e))
}

#[component]
pub fn UploadPanel(on_uploaded: EventHandler<AnalysisResult>) -> Element {
    let client = use_context::<HttpClient>();
    let mut file_name = use_signal(|| None::<String>);
    let mut uploading = use_signal(|| false);
    let mut error = use_signal(|| None::<String>);

    let busy = *uploading.read();
    let chosen = file_name.read().clone();
    let error_text = error.read().clone();
    let can_upload = chosen.is_some() && !busy;

    rsx! {
        div { class: "panel upload",
            h3 { "Upload Target Image" }
            label { class: "file-drop", r#for: FILE_INPUT_ID,
                match chosen {
                    Some(name) => rsx! { span { class: "file-name", "{name}" } },
                    None => rsx! { span { "Click to select a target photo" } },
                }
            }
            input {
                id: FILE_INPUT_ID,
                r#type: "file",
                accept: "image/*",
                style: "display:none;",
                onchange: move |_| {
                    file_name.set(selected_file().map(|f| f.name()));
                    error.set(None);
                },
            }
            button {
                disabled: !can_upload,
                onclick: move |_| {
                    let client = client.clone();
                    uploading.set(true);
                    spawn(async move {
                        match upload_selected(&client).await {
                            Ok(result) => {
                                tracing::info!(id = %result.id, shots = result.shot_count, "Target analyzed");
                                error.set(None);
                                on_uploaded.call(result);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Upload failed");
                                error.set(Some(e));
                            }
                        }
                        uploading.set(false);
                    });
                },
                if busy { "Analyzing..." } else { "Upload & Analyze" }
            }
            if let Some(msg) = error_text {
                div { class: "notice error", "{msg}" }
            }
        }
    }
}
