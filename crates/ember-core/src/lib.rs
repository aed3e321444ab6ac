//! Core data model and collaborator traits for Ember.
//!
//! This crate is shared by every other Ember crate. It defines:
//!
//! - the canonical inbound shapes ([`NormalizedMessage`], [`NormalizedEvent`],
//!   [`Inbound`]) and the generic outbound [`Reply`];
//! - the verification outcome [`VerifyResult`] used by handler resolution;
//! - the error taxonomy ([`TransportError`], [`ControlPlaneError`],
//!   [`GatewayError`], [`RegistrationConflict`]) and dispatch faults
//!   ([`HandlerFault`] with its [`FaultKind`] hierarchy);
//! - the collaborator traits ([`Transport`], [`Connector`], [`ControlPlane`],
//!   [`Bot`], [`Adapter`], [`InboundHandler`]).

pub mod bot;
pub mod error;
pub mod event;
pub mod fault;
pub mod message;
pub mod transport;
pub mod verify;

pub use bot::{
    Adapter, Bot, BoxedAdapter, BoxedBot, BoxedInboundHandler, InboundHandler, Target,
};
pub use error::{
    ControlPlaneError, ControlPlaneResult, GatewayError, GatewayResult, NormalizeError,
    RegistrationConflict, TransportError, TransportResult,
};
pub use event::{Inbound, NormalizedEvent};
pub use fault::{FaultKind, HandlerFault, HandlerResult};
pub use message::{Attachment, Attachments, Mentions, MessageText, NormalizedMessage, Reply, Sender};
pub use transport::{
    BoxedConnector, BoxedControlPlane, BoxedTransport, Connector, ControlPlane, Transport,
    check_response,
};
pub use verify::{Keypoint, VerifyResult};
