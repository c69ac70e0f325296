use dioxus::prelude::*;
use photomoa_shared::models::HistoryEntry;

use crate::api::{ApiError, HttpClient};

/// Shots listed per entry before collapsing into a "+N more" tag.
const SHOT_PREVIEW: usize = 6;

/// History listing plus the last fetch problem, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryState {
    pub entries: Vec<HistoryEntry>,
    pub notice: Option<String>,
}

impl HistoryState {
    /// A failed fetch keeps whatever was listed before.
    pub fn apply_fetch(&mut self, outcome: Result<Vec<HistoryEntry>, ApiError>) {
        match outcome {
            Ok(entries) => {
                self.entries = entries;
                self.notice = None;
            }
            Err(e) => self.notice = Some(format!("Could not refresh history: {}", e)),
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.retain(|e| e.id != id);
    }
}

/// `2024-01-05T14:03:22+00:00` -> `2024-01-05 14:03`.
fn format_upload_time(upload_time: &str) -> String {
    match upload_time.split_once('T') {
        Some((date, time)) => format!("{} {}", date, time.get(..5).unwrap_or(time)),
        None => upload_time.to_string(),
    }
}

fn format_moa(moa: Option<f64>) -> String {
    moa.map(|v| format!("{:.2}\"", v))
        .unwrap_or_else(|| "N/A".to_string())
}

fn shot_preview(entry: &HistoryEntry) -> (Vec<String>, usize) {
    let shown = entry
        .shots
        .iter()
        .take(SHOT_PREVIEW)
        .enumerate()
        .map(|(i, p)| format!("{}: ({:.0}, {:.0})", i + 1, p.x, p.y))
        .collect();
    (shown, entry.shots.len().saturating_sub(SHOT_PREVIEW))
}

fn confirm_delete() -> bool {
    web_sys::window()
        .and_then(|w| {
            w.confirm_with_message("Are you sure you want to delete this target?")
                .ok()
        })
        .unwrap_or(false)
}

#[component]
pub fn HistoryPanel(history: Signal<HistoryState>, on_deleted: EventHandler<String>) -> Element {
    let client = use_context::<HttpClient>();
    let HistoryState { entries, notice } = history.read().clone();

    if entries.is_empty() {
        return rsx! {
            div { class: "panel history",
                h3 { "Upload History" }
                if let Some(msg) = &notice {
                    div { class: "notice warning", "{msg}" }
                }
                p { class: "empty", "No targets analyzed yet" }
                p { class: "empty-hint", "Upload your first target to get started" }
            }
        };
    }

    rsx! {
        div { class: "panel history",
            h3 { "Upload History" }
            if let Some(msg) = &notice {
                div { class: "notice warning", "{msg}" }
            }
            for entry in entries {
                {
                    let id = entry.id.clone();
                    let client = client.clone();
                    let when = format_upload_time(&entry.upload_time);
                    let moa = format_moa(entry.moa_value);
                    let thumb = client.image_url(&entry.annotated_filename);
                    let (preview, more) = shot_preview(&entry);
                    rsx! {
                        div { key: "{entry.id}", class: "history-entry",
                            div { class: "history-header",
                                div {
                                    h4 { "{entry.filename}" }
                                    p { class: "time", "{when}" }
                                }
                                div { class: "history-stats",
                                    span { "Shots: {entry.shot_count}" }
                                    span { "MOA: {moa}" }
                                    button {
                                        class: "danger",
                                        onclick: move |_| {
                                            if !confirm_delete() {
                                                return;
                                            }
                                            let id = id.clone();
                                            let client = client.clone();
                                            spawn(async move {
                                                match client.delete_entry(&id).await {
                                                    Ok(()) => {
                                                        history.write().remove(&id);
                                                        on_deleted.call(id);
                                                    }
                                                    Err(e) => {
                                                        tracing::warn!(error = %e, id = %id, "Delete failed");
                                                        history.write().notice = Some(format!("Delete failed: {}", e));
                                                    }
                                                }
                                            });
                                        },
                                        "Delete"
                                    }
                                }
                            }
                            img { class: "thumbnail", src: "{thumb}", alt: "Target analysis" }
                            if !preview.is_empty() {
                                div { class: "shot-preview",
                                    for line in preview {
                                        span { class: "mono", "{line}" }
                                    }
                                    if more > 0 {
                                        span { class: "more", "+{more} more" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
