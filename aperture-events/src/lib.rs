//! Flag change notifications for Aperture.
//!
//! Every flag create/update/delete publishes a [`FlagChanged`] event.
//! Listeners (the local evaluation cache, or a bridge to an external
//! pub/sub transport) subscribe to invalidate their state. Delivery is
//! best-effort: a failing listener is logged and skipped, never fails the
//! mutation that triggered it.

pub mod event;
pub mod notifier;

pub use event::{FlagChanged, FlagOperation};
pub use notifier::{
    ChangeListener, ChangeNotifier, InProcessNotifier, NotifyError, SubscriptionId,
};
