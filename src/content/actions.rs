//! What bound gestures do. Every action takes the context it runs in and the
//! element the gesture targeted; failures are silent no-ops.

use std::sync::Arc;

use tracing::debug;

use crate::bindings::Action;
use crate::host::{Element, History};
use crate::ipc::port::PortSender;
use crate::ipc::ContentMessage;

/// The parts of a browsing context actions may touch.
#[derive(Clone)]
pub struct ActionContext {
    pub history: Arc<dyn History>,
    pub port: PortSender,
}

pub fn perform(action: Action, ctx: &ActionContext, target: &dyn Element) {
    debug!(context = %ctx.port.context(), %action, "Running action");
    match action {
        Action::NavigateBack => ctx.history.back(),
        Action::NavigateForward => ctx.history.forward(),
        Action::PreviousTab => ctx.port.send(ContentMessage::CycleTab { offset: -1 }),
        Action::NextTab => ctx.port.send(ContentMessage::CycleTab { offset: 1 }),
        Action::ZoomImageIn => zoom_image(target, 2.0),
        Action::ZoomImageOut => zoom_image(target, 0.5),
    }
}

/// Scale an `<img>` by `factor`; anything else is left alone.
fn zoom_image(img: &dyn Element, factor: f64) {
    if !img.tag_name().eq_ignore_ascii_case("img") {
        return;
    }
    let (width, height) = img.size();
    img.set_size(width * factor, height * factor);
}
