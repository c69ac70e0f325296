pub mod history_panel;
pub mod results_view;
pub mod upload_panel;
