use dioxus::prelude::*;
use photomoa_shared::models::AnalysisResult;

use crate::api::HttpClient;
use crate::components::history_panel::{HistoryPanel, HistoryState};
use crate::components::results_view::ResultsView;
use crate::components::upload_panel::UploadPanel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Upload,
    History,
}

#[component]
pub fn Analyzer() -> Element {
    let client = use_context::<HttpClient>();

    // Session state: the result on screen and the history listing
    let mut current = use_signal(|| None::<AnalysisResult>);
    let mut active_tab = use_signal(|| Tab::Upload);
    let mut history = use_signal(HistoryState::default);
    let mut history_version = use_signal(|| 0u32);

    // Refetch whenever the version is bumped; failures keep the old listing
    let _history_loader = use_resource(move || {
        let _version = *history_version.read();
        let client = client.clone();
        async move {
            let outcome = client.fetch_history().await;
            if let Err(e) = &outcome {
                tracing::warn!(error = %e, "Failed to fetch history");
            }
            history.write().apply_fetch(outcome);
        }
    });

    let tab = *active_tab.read();
    let shown = current.read().clone();

    rsx! {
        div { class: "app",
            div { class: "header",
                h1 { "PhotoMOA" }
                p { class: "tagline", "Shot Grouping Analysis Tool" }
            }
            div { class: "tabs",
                button {
                    class: if tab == Tab::Upload { "active" } else { "" },
                    onclick: move |_| active_tab.set(Tab::Upload),
                    "Upload & Analyze"
                }
                button {
                    class: if tab == Tab::History { "active" } else { "" },
                    onclick: move |_| active_tab.set(Tab::History),
                    "History"
                }
            }
            match tab {
                Tab::Upload => rsx! {
                    div { class: "upload-layout",
                        UploadPanel {
                            on_uploaded: move |result: AnalysisResult| {
                                current.set(Some(result));
                                history_version += 1;
                            },
                        }
                        if let Some(result) = shown {
                            ResultsView {
                                key: "{result.id}",
                                result: result.clone(),
                                on_replaced: move |updated: AnalysisResult| {
                                    current.set(Some(updated));
                                    history_version += 1;
                                },
                            }
                        }
                    }
                },
                Tab::History => rsx! {
                    HistoryPanel {
                        history: history,
                        on_deleted: move |id: String| {
                            let showing_deleted = current
                                .read()
                                .as_ref()
                                .is_some_and(|r| r.id == id);
                            if showing_deleted {
                                current.set(None);
                            }
                        },
                    }
                },
            }
        }
    }
}
