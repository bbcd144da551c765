//! Host embedding contract for the guestchat widget.
//!
//! A host page supplies configuration either as a global object merged over
//! the defaults ([`WidgetBuilder::from_global`]) or as custom-element
//! attributes ([`ElementAttributes`]). [`WidgetBuilder::mount`] wires the
//! adapters and returns the [`ChatElement`] the page talks to.

mod attributes;
mod builder;
mod element;

pub use attributes::ElementAttributes;
pub use builder::WidgetBuilder;
pub use element::ChatElement;

pub use guestchat_protocol::{HostEnvironment, WidgetConfiguration};
pub use guestchat_runtime::RuntimeConfig;
