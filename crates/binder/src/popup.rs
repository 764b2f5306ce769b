use crate::glossary::Glossary;

/// Identifies one annotation span in the rendered page, in fragment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpanId(pub u32);

/// Popup lifecycle: at most one definition popup is visible at any time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
	#[default]
	Closed,
	Open(SpanId),
}

/// Inputs from the presentation shell. Pointer activation and the
/// confirm/space key on a focused span both arrive as `Activate`; the
/// cancel key and clicks outside popup and spans arrive as their own
/// events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupEvent {
	Activate { span: SpanId, term: String },
	CloseControl,
	OutsideActivation,
	CancelKey,
}

/// Instructions for the presentation shell, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupEffect {
	Dismiss,
	SetInactive(SpanId),
	Show {
		anchor: SpanId,
		definition: String,
		image: Option<String>,
	},
	SetActive(SpanId),
	FocusAnchor(SpanId),
	FocusCloseControl,
}

/// Single-active-popup state machine bound to annotated terms.
///
/// Opening always dismisses any prior popup first, re-activating the same
/// span produces a fresh popup, and closing through the close control or
/// the cancel key returns focus to the originating span. Activating a span
/// whose term no longer resolves in the glossary is a silent no-op.
#[derive(Debug, Default)]
pub struct PopupController {
	state: PopupState,
}

impl PopupController {
	pub fn state(&self) -> PopupState {
		self.state
	}

	pub fn handle(&mut self, event: PopupEvent, glossary: &Glossary) -> Vec<PopupEffect> {
		match event {
			PopupEvent::Activate { span, term } => self.activate(span, &term, glossary),
			PopupEvent::CloseControl => self.close(true),
			PopupEvent::CancelKey => self.close(true),
			PopupEvent::OutsideActivation => self.close(false),
		}
	}

	fn activate(&mut self, span: SpanId, term: &str, glossary: &Glossary) -> Vec<PopupEffect> {
		let Some(entry) = glossary.lookup(term) else {
			log::trace!("No glossary entry for {term:?}, ignoring activation");
			return Vec::new();
		};

		let mut effects = Vec::new();
		if let PopupState::Open(previous) = self.state {
			effects.push(PopupEffect::Dismiss);
			effects.push(PopupEffect::SetInactive(previous));
		}
		self.state = PopupState::Open(span);
		effects.push(PopupEffect::Show {
			anchor: span,
			definition: entry.definition().to_string(),
			image: entry.image().map(str::to_string),
		});
		effects.push(PopupEffect::SetActive(span));
		effects.push(PopupEffect::FocusCloseControl);
		effects
	}

	fn close(&mut self, refocus_anchor: bool) -> Vec<PopupEffect> {
		let PopupState::Open(anchor) = self.state else {
			return Vec::new();
		};
		self.state = PopupState::Closed;
		let mut effects = vec![PopupEffect::Dismiss, PopupEffect::SetInactive(anchor)];
		if refocus_anchor {
			effects.push(PopupEffect::FocusAnchor(anchor));
		}
		effects
	}
}
