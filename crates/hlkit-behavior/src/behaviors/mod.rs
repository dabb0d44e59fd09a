//! Built-in behaviors bound by name from the `behavior` attribute.

mod dialog;
mod hyperlink;
mod tabs;

use std::rc::Rc;

use crate::handler::EventHandler;

pub use dialog::LightBoxDialog;
pub use hyperlink::Hyperlink;
pub use tabs::Tabs;

pub const TABS: &str = "tabs";
pub const LIGHT_BOX_DIALOG: &str = "light-box-dialog";
pub const HYPERLINK: &str = "hyperlink";

/// Name and shared instance of every built-in behavior. `dialog` is the
/// instance the router also uses for show/hide requests.
pub fn builtin(dialog: Rc<LightBoxDialog>) -> Vec<(&'static str, Rc<dyn EventHandler>)> {
    vec![
        (TABS, Rc::new(Tabs::new()) as Rc<dyn EventHandler>),
        (LIGHT_BOX_DIALOG, dialog),
        (HYPERLINK, Rc::new(Hyperlink::new())),
    ]
}
