//! Background refresh of `dynamic` previews.
//!
//! One slot per page frame. Each trigger bumps the slot's generation and cancels the
//! command still running for the previous one, so results land last-started-wins and
//! anything tagged with an older generation is dropped on arrival.

use crate::error::CommandError;
use crate::model::Invocation;
use crate::services::executor::{execute_streaming, CancelToken, CommandOutput, ExecOptions};
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::thread;

pub type SlotId = u64;

#[derive(Debug)]
pub enum PreviewEvent {
    Chunk {
        slot: SlotId,
        generation: u64,
        text: String,
    },
    Done {
        slot: SlotId,
        generation: u64,
        outcome: Result<CommandOutput, CommandError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewStatus {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug)]
pub struct SlotState {
    /// Item key the text belongs to.
    pub key: String,
    pub generation: u64,
    pub text: String,
    pub status: PreviewStatus,
    cancel: Option<CancelToken>,
}

/// Final text of a completed refresh, handed back so the caller can cache it.
#[derive(Debug, PartialEq, Eq)]
pub struct Completed {
    pub slot: SlotId,
    pub key: String,
    pub text: String,
}

pub struct PreviewRefresher {
    slots: HashMap<SlotId, SlotState>,
    next_generation: u64,
    tx: Sender<PreviewEvent>,
}

impl PreviewRefresher {
    pub fn new(tx: Sender<PreviewEvent>) -> Self {
        Self {
            slots: HashMap::new(),
            next_generation: 1,
            tx,
        }
    }

    pub fn slot(&self, slot: SlotId) -> Option<&SlotState> {
        self.slots.get(&slot)
    }

    /// Start refreshing `slot` for item `key`. `parent` is the owning frame's token,
    /// so popping the frame also stops the refresh.
    pub fn trigger(
        &mut self,
        slot: SlotId,
        key: impl Into<String>,
        inv: Invocation,
        mut opts: ExecOptions,
        parent: &CancelToken,
    ) -> u64 {
        self.cancel(slot);
        let generation = self.next_generation;
        self.next_generation += 1;
        let token = parent.child();
        opts.cancel = Some(token.clone());
        // Previews never read the terminal.
        opts.stdin = None;
        self.slots.insert(
            slot,
            SlotState {
                key: key.into(),
                generation,
                text: String::new(),
                status: PreviewStatus::Loading,
                cancel: Some(token),
            },
        );
        log::debug!("preview slot {slot} gen {generation}: {}", inv.display());
        let tx = self.tx.clone();
        thread::spawn(move || {
            let chunk_tx = tx.clone();
            let outcome = execute_streaming(&inv, &opts, |text| {
                let _ = chunk_tx.send(PreviewEvent::Chunk {
                    slot,
                    generation,
                    text: text.to_string(),
                });
            });
            let _ = tx.send(PreviewEvent::Done {
                slot,
                generation,
                outcome,
            });
        });
        generation
    }

    /// Show fixed text in `slot` without running anything (static previews, cache hits).
    pub fn set_static(&mut self, slot: SlotId, key: impl Into<String>, text: impl Into<String>) {
        self.cancel(slot);
        let generation = self.next_generation;
        self.next_generation += 1;
        self.slots.insert(
            slot,
            SlotState {
                key: key.into(),
                generation,
                text: text.into(),
                status: PreviewStatus::Ready,
                cancel: None,
            },
        );
    }

    /// Stop the in-flight command for `slot`, if any. The slot's text is kept.
    pub fn cancel(&mut self, slot: SlotId) {
        if let Some(state) = self.slots.get_mut(&slot) {
            if let Some(token) = state.cancel.take() {
                token.cancel();
            }
        }
    }

    /// Drop the slot entirely; its late results will find nothing to update.
    pub fn forget(&mut self, slot: SlotId) {
        self.cancel(slot);
        self.slots.remove(&slot);
    }

    pub fn is_current(&self, slot: SlotId, generation: u64) -> bool {
        self.slots
            .get(&slot)
            .map(|s| s.generation == generation)
            .unwrap_or(false)
    }

    /// Fold a worker event into the slot. Stale events are ignored. Returns the full
    /// text when a refresh completes successfully.
    pub fn apply(&mut self, event: PreviewEvent) -> Option<Completed> {
        match event {
            PreviewEvent::Chunk {
                slot,
                generation,
                text,
            } => {
                if self.is_current(slot, generation) {
                    if let Some(state) = self.slots.get_mut(&slot) {
                        state.text.push_str(&text);
                    }
                }
                None
            }
            PreviewEvent::Done {
                slot,
                generation,
                outcome,
            } => {
                if !self.is_current(slot, generation) {
                    log::debug!("preview slot {slot}: dropped stale gen {generation}");
                    return None;
                }
                let state = self.slots.get_mut(&slot)?;
                state.cancel = None;
                match outcome {
                    Ok(out) if out.success() => {
                        state.text = out.stdout;
                        state.status = PreviewStatus::Ready;
                        Some(Completed {
                            slot,
                            key: state.key.clone(),
                            text: state.text.clone(),
                        })
                    }
                    Ok(out) => {
                        let stderr = out.stderr.trim_end().to_string();
                        state.status = PreviewStatus::Failed(format!(
                            "exit {}{}",
                            out.code,
                            if stderr.is_empty() {
                                String::new()
                            } else {
                                format!(": {stderr}")
                            }
                        ));
                        None
                    }
                    Err(CommandError::Cancelled) => None,
                    Err(e) => {
                        state.status = PreviewStatus::Failed(e.to_string());
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
impl SlotState {
    pub fn with_status(key: &str, text: &str, status: PreviewStatus) -> Self {
        Self {
            key: key.into(),
            generation: 1,
            text: text.into(),
            status,
            cancel: None,
        }
    }
}
