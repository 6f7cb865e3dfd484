//! Force feedback requests arriving on a uinput device.
//!
//! Userspace uploads and erases effects through the kernel, which forwards each request to the
//! uinput owner as an `EV_UINPUT` event and then blocks the caller until the owner answers. A
//! transaction is therefore: parse the request, build a response, acknowledge it. The device
//! adapters do the parsing and acknowledging; [`respond`] builds the response.

use crate::event::Rumble;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfEffectKind {
    Rumble {
        strong_magnitude: u16,
        weak_magnitude: u16,
    },
    /// Anything else a client may upload: periodic, constant, condition effects.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FfEffect {
    pub id: i32,
    pub kind: FfEffectKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfRequest {
    Upload(FfEffect),
    Erase { effect_id: i32 },
}

/// Status handed back to the kernel. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FfResponse {
    pub retval: i32,
}

impl FfResponse {
    pub const OK: Self = Self { retval: 0 };
}

/// Every request is accepted. Rumble uploads replace `current`, which is what gets played on
/// the next play request. Erase requests leave `current` alone.
pub fn respond(request: &FfRequest, current: &mut Option<Rumble>) -> FfResponse {
    match request {
        FfRequest::Upload(effect) => match effect.kind {
            FfEffectKind::Rumble {
                strong_magnitude,
                weak_magnitude,
            } => {
                let rumble = Rumble::from_raw(weak_magnitude, strong_magnitude);
                log::debug!("rumble effect {} uploaded: {rumble:?}", effect.id);
                *current = Some(rumble);
            }
            FfEffectKind::Other => {
                log::debug!("non-rumble effect {} uploaded, ignoring", effect.id);
            }
        },
        FfRequest::Erase { effect_id } => {
            log::trace!("effect {effect_id} erased");
        }
    }
    FfResponse::OK
}
