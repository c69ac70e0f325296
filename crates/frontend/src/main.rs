mod api;
mod calibration;
mod components;
mod coords;
mod pages;
mod shots;
mod viewer;

use dioxus::prelude::*;

const CSS: Asset = asset!("/assets/main.css");

#[allow(non_snake_case)]
fn App() -> Element {
    use_context_provider(api::HttpClient::from_env);

    rsx! {
        document::Title { "PhotoMOA" }
        document::Stylesheet { href: CSS }
        pages::analyzer::Analyzer {}
    }
}

fn main() {
    launch(App);
}
