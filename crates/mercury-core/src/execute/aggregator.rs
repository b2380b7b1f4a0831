//! Folding execution events into a result.

use base64::Engine;

use mercury_sync::truncate_chars;

use crate::event::{ExecutionEvent, MimeBundle};

use super::result::ImageOutput;

/// Characters of HTML kept in a text preview.
pub const HTML_PREVIEW_CHARS: usize = 500;

const SVG_MIME: &str = "image/svg+xml";

/// Whether the execution loop should keep reading events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    Continue,
    /// The idle event arrived; the request is complete.
    Finished,
}

/// Per-request accumulator of text, images and errors.
#[derive(Debug, Default)]
pub struct EventAggregator {
    outputs: Vec<String>,
    images: Vec<ImageOutput>,
    errors: Vec<String>,
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event. Events are expected in emission order.
    pub fn fold(&mut self, event: &ExecutionEvent) -> Fold {
        match event {
            ExecutionEvent::Status(_) if event.is_idle() => return Fold::Finished,
            ExecutionEvent::Status(_) => {}
            ExecutionEvent::Stream { text, .. } => self.outputs.push(text.clone()),
            ExecutionEvent::Result(bundle) | ExecutionEvent::Display(bundle) => self.fold_bundle(bundle),
            ExecutionEvent::Error { traceback, .. } => self.errors.push(traceback.join("\n")),
        }
        Fold::Continue
    }

    fn fold_bundle(&mut self, bundle: &MimeBundle) {
        if let Some(text) = bundle.text("text/plain") {
            self.outputs.push(text);
        }
        if let Some(html) = bundle.text("text/html") {
            self.outputs.push(html_preview(&html));
        }

        for mime in bundle.mime_types().filter(|m| m.starts_with("image/")) {
            let Some(payload) = bundle.text(mime) else {
                continue;
            };
            let data = if mime == SVG_MIME {
                // SVG arrives as markup; everything else is already base64
                base64::engine::general_purpose::STANDARD.encode(payload.as_bytes())
            } else {
                payload.trim().to_string()
            };
            self.images.push(ImageOutput {
                data,
                mime_type: mime.to_string(),
            });
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Collected text joined with newlines, `None` if there was none.
    pub fn output(&self) -> Option<String> {
        (!self.outputs.is_empty()).then(|| self.outputs.join("\n"))
    }

    /// Collected error texts joined with newlines.
    pub fn error_text(&self) -> Option<String> {
        (!self.errors.is_empty()).then(|| self.errors.join("\n"))
    }

    pub fn images(&self) -> &[ImageOutput] {
        &self.images
    }

    pub fn into_images(self) -> Vec<ImageOutput> {
        self.images
    }
}

fn html_preview(html: &str) -> String {
    format!("[HTML Output]\n{}...", truncate_chars(html, HTML_PREVIEW_CHARS))
}
