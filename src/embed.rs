//! Embed loader: mounts the floating toggle and hidden widget iframe into a
//! host page and owns their open/closed state.
//!
//! The served `widget.js` is rendered from the same constants, so the
//! in-browser loader and [`EmbedSession`] agree on attribute names and layout.

use log::{debug, error};
use thiserror::Error;
use url::Url;

pub const WEBSITE_ID_ATTR: &str = "data-website-id";
pub const CLOSE_CONTROL_ATTR: &str = "data-close-widget";
pub const CONTAINER_CLASS: &str = "chat-widget-container";
pub const SCRIPT_PATH: &str = "widget.js";
pub const WIDGET_PATH: &str = "widget";

pub const CONTAINER_STYLE: &str = "position: fixed; bottom: 20px; right: 20px; z-index: 1000;";
pub const TOGGLE_STYLE: &str = "position: fixed; bottom: 20px; right: 20px; width: 50px; height: 50px; \
     border-radius: 50%; background: #0066FF; color: white; border: none; cursor: pointer; \
     align-items: center; justify-content: center; box-shadow: 0 2px 12px rgba(0,0,0,0.1);";
pub const FRAME_STYLE: &str = "border: none; width: 400px; height: 600px;";

#[derive(Debug, Error)]
pub enum WidgetSourceError {
    #[error("invalid base URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("base URL {0} cannot carry a path")]
    NotABase(String),
}

/// Where the widget is served from. One base URL resolves the script, the
/// iframe page and the paste-able snippet.
#[derive(Debug, Clone)]
pub struct WidgetSource {
    base: Url,
}

impl WidgetSource {
    pub fn new(base_url: &str) -> Result<Self, WidgetSourceError> {
        let mut base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(WidgetSourceError::NotABase(base_url.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn script_url(&self) -> Url {
        self.join(&[SCRIPT_PATH])
    }

    pub fn widget_url(&self, website_id: &str) -> Url {
        self.join(&[WIDGET_PATH, website_id])
    }

    pub fn snippet(&self, website_id: &str) -> String {
        format!(
            r#"<script src="{}" {}="{}"></script>"#,
            self.script_url(),
            WEBSITE_ID_ATTR,
            escape_attr(website_id)
        )
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    None,
    Block,
    Flex,
}

/// The slice of a host page's DOM the loader touches.
pub trait HostPage {
    type Element: Clone;

    /// Attribute on the `<script>` tag that loaded the loader.
    fn script_attribute(&self, name: &str) -> Option<String>;
    fn create_element(&mut self, tag: &str) -> Self::Element;
    fn set_attribute(&mut self, element: &Self::Element, name: &str, value: &str);
    fn set_style(&mut self, element: &Self::Element, css: &str);
    fn set_display(&mut self, element: &Self::Element, display: Display);
    fn append_to_body(&mut self, element: &Self::Element);
    fn append_child(&mut self, parent: &Self::Element, child: &Self::Element);
    /// Whether the frame's document has loaded and exposes a
    /// `[data-close-widget]` control.
    fn frame_close_control(&self, frame: &Self::Element) -> bool;
}

/// One mounted widget: built once per script load.
#[derive(Debug)]
pub struct EmbedSession<E> {
    website_id: String,
    container: E,
    frame: E,
    toggle: E,
    open: bool,
}

impl<E: Clone> EmbedSession<E> {
    /// Mounts the widget. Returns `None` without touching the page when the
    /// script tag carries no site identifier.
    pub fn mount<H>(host: &mut H, source: &WidgetSource) -> Option<Self>
    where
        H: HostPage<Element = E>,
    {
        let website_id = match host.script_attribute(WEBSITE_ID_ATTR) {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                error!("Widget Error: No website ID provided");
                return None;
            }
        };

        let container = host.create_element("div");
        host.set_attribute(&container, "class", CONTAINER_CLASS);
        host.set_style(&container, CONTAINER_STYLE);
        host.append_to_body(&container);

        let frame = host.create_element("iframe");
        host.set_style(&frame, FRAME_STYLE);
        host.set_display(&frame, Display::None);
        host.set_attribute(&frame, "src", source.widget_url(&website_id).as_str());
        host.append_child(&container, &frame);

        let toggle = host.create_element("button");
        host.set_style(&toggle, TOGGLE_STYLE);
        host.set_display(&toggle, Display::Flex);
        host.append_child(&container, &toggle);

        debug!("Mounted chat widget for website {}", website_id);
        Some(Self { website_id, container, frame, toggle, open: false })
    }

    pub fn website_id(&self) -> &str {
        &self.website_id
    }

    pub fn container(&self) -> &E {
        &self.container
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open<H: HostPage<Element = E>>(&mut self, host: &mut H) {
        if self.open {
            return;
        }
        host.set_display(&self.frame, Display::Block);
        host.set_display(&self.toggle, Display::None);
        self.open = true;
    }

    pub fn close<H: HostPage<Element = E>>(&mut self, host: &mut H) {
        if !self.open {
            return;
        }
        host.set_display(&self.frame, Display::None);
        host.set_display(&self.toggle, Display::Flex);
        self.open = false;
    }

    /// Toggle button click. Only ever opens.
    pub fn on_toggle_click<H: HostPage<Element = E>>(&mut self, host: &mut H) {
        self.open(host);
    }

    /// Click on the close control inside the frame. No-op while the frame
    /// has not loaded or has no such control.
    pub fn on_close_click<H: HostPage<Element = E>>(&mut self, host: &mut H) {
        if host.frame_close_control(&self.frame) {
            self.close(host);
        }
    }
}
