//! Region selection: the drag gesture state machine and the overlay slot.
//!
//! A gesture moves strictly forward: `Idle → Dragging → Committed|Cancelled`.
//! Only one overlay may exist at a time; opening a new one force-closes the
//! previous overlay (last writer wins, nothing is queued).

use crate::geometry::{size_label, DisplayLayout, Point, Rect};
use serde::{Deserialize, Serialize};

/// Both sides of a selection must exceed this many logical points.
pub const MIN_SELECTION_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionState {
    Idle,
    Dragging,
    Committed,
    Cancelled,
}

/// Result of a finished gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionOutcome {
    /// Top-left capture-space rectangle ready for the capture orchestrator.
    Committed(Rect),
    Cancelled,
}

/// Redraw payload for the overlay while dragging.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionFeedback {
    /// Current rectangle in the overlay's global space.
    pub rect: Rect,
    pub label: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SelectionError {
    #[error("A selection drag is already in progress")]
    GestureInProgress,

    #[error("Selection gesture already finished ({0:?})")]
    GestureFinished(SelectionState),

    #[error("Selection overlay {0:?} is no longer active")]
    StaleOverlay(OverlayTicket),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionGesture {
    start: Option<Point>,
    current: Option<Point>,
    state: SelectionState,
}

impl Default for SelectionGesture {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionGesture {
    pub fn new() -> Self {
        Self {
            start: None,
            current: None,
            state: SelectionState::Idle,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Rectangle spanned so far, in the pointer's global space.
    pub fn current_rect(&self) -> Option<Rect> {
        match (self.start, self.current) {
            (Some(start), Some(current)) => Some(Rect::from_corners(start, current)),
            _ => None,
        }
    }

    pub fn press(&mut self, at: Point) -> Result<(), SelectionError> {
        match self.state {
            SelectionState::Idle => {
                self.start = Some(at);
                self.current = Some(at);
                self.state = SelectionState::Dragging;
                Ok(())
            }
            SelectionState::Dragging => Err(SelectionError::GestureInProgress),
            finished => Err(SelectionError::GestureFinished(finished)),
        }
    }

    /// Updates the moving corner. Ignored unless dragging.
    pub fn drag_to(&mut self, at: Point) -> Option<SelectionFeedback> {
        if self.state != SelectionState::Dragging {
            return None;
        }
        self.current = Some(at);
        self.current_rect().map(|rect| SelectionFeedback {
            label: size_label(&rect),
            rect,
        })
    }

    /// Ends the drag. Selections not larger than [`MIN_SELECTION_SIZE`] in
    /// both dimensions are cancelled; committed ones are mapped into capture
    /// space through `layout`.
    pub fn release(&mut self, at: Point, layout: &DisplayLayout) -> SelectionOutcome {
        if self.state != SelectionState::Dragging {
            self.discard();
            return SelectionOutcome::Cancelled;
        }
        self.current = Some(at);
        let rect = match self.current_rect() {
            Some(rect) => rect,
            None => {
                self.discard();
                return SelectionOutcome::Cancelled;
            }
        };

        if rect.width > MIN_SELECTION_SIZE && rect.height > MIN_SELECTION_SIZE {
            let capture = layout.to_capture_rect(rect);
            log::info!(
                "[SELECTION] Committed global {:?} -> capture {:?} (max_screen_y={})",
                rect,
                capture,
                layout.max_screen_y()
            );
            self.state = SelectionState::Committed;
            SelectionOutcome::Committed(capture)
        } else {
            log::info!(
                "[SELECTION] Cancelled: {}x{} is below the {}pt minimum",
                rect.width,
                rect.height,
                MIN_SELECTION_SIZE
            );
            self.discard();
            SelectionOutcome::Cancelled
        }
    }

    /// Escape key. Returns whether a drag was actually in progress.
    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.state == SelectionState::Dragging;
        self.discard();
        was_dragging
    }

    /// Back to `Idle` after a finished gesture.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn discard(&mut self) {
        self.start = None;
        self.current = None;
        self.state = SelectionState::Cancelled;
    }
}

/// Identifies one overlay instance; events for a replaced overlay are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayTicket(pub u64);

/// An open selection overlay: its gesture plus the display layout snapshot
/// taken when it opened.
#[derive(Debug)]
pub struct SelectionOverlay {
    ticket: OverlayTicket,
    layout: DisplayLayout,
    gesture: SelectionGesture,
}

impl SelectionOverlay {
    pub fn ticket(&self) -> OverlayTicket {
        self.ticket
    }

    pub fn layout(&self) -> &DisplayLayout {
        &self.layout
    }

    pub fn gesture(&self) -> &SelectionGesture {
        &self.gesture
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedOverlay {
    pub ticket: OverlayTicket,
    /// The overlay that was force-closed to make room, if any.
    pub replaced: Option<OverlayTicket>,
}

/// Holds at most one selection overlay.
#[derive(Debug, Default)]
pub struct OverlaySlot {
    next_ticket: u64,
    active: Option<SelectionOverlay>,
}

impl OverlaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, layout: DisplayLayout) -> OpenedOverlay {
        let replaced = self.close();
        if let Some(old) = replaced {
            log::info!("[SELECTION] Force-closed overlay {:?}", old);
        }
        self.next_ticket += 1;
        let ticket = OverlayTicket(self.next_ticket);
        self.active = Some(SelectionOverlay {
            ticket,
            layout,
            gesture: SelectionGesture::new(),
        });
        OpenedOverlay { ticket, replaced }
    }

    /// Closes the active overlay, discarding any in-progress gesture.
    pub fn close(&mut self) -> Option<OverlayTicket> {
        self.active.take().map(|overlay| overlay.ticket)
    }

    pub fn active(&self) -> Option<&SelectionOverlay> {
        self.active.as_ref()
    }

    pub fn press(&mut self, ticket: OverlayTicket, at: Point) -> Result<(), SelectionError> {
        self.overlay_mut(ticket)?.gesture.press(at)
    }

    pub fn drag_to(
        &mut self,
        ticket: OverlayTicket,
        at: Point,
    ) -> Result<Option<SelectionFeedback>, SelectionError> {
        Ok(self.overlay_mut(ticket)?.gesture.drag_to(at))
    }

    /// Releases the drag and closes the overlay whatever the outcome.
    pub fn release(
        &mut self,
        ticket: OverlayTicket,
        at: Point,
    ) -> Result<SelectionOutcome, SelectionError> {
        let overlay = self.overlay_mut(ticket)?;
        let outcome = overlay.gesture.release(at, &overlay.layout);
        self.active = None;
        Ok(outcome)
    }

    /// Escape: cancels the gesture and closes the overlay.
    pub fn cancel(&mut self, ticket: OverlayTicket) -> Result<(), SelectionError> {
        let overlay = self.overlay_mut(ticket)?;
        if overlay.gesture.cancel() {
            log::info!("[SELECTION] Drag cancelled");
        }
        self.active = None;
        Ok(())
    }

    fn overlay_mut(&mut self, ticket: OverlayTicket) -> Result<&mut SelectionOverlay, SelectionError> {
        match self.active.as_mut() {
            Some(overlay) if overlay.ticket == ticket => Ok(overlay),
            _ => Err(SelectionError::StaleOverlay(ticket)),
        }
    }
}
