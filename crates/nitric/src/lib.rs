//! Nitric SDK core
//!
//! Client-side runtime for applications served by a Nitric server. Every
//! event source (API routes, topic subscriptions, schedules, bucket
//! notifications, websockets, batch jobs and generic triggers) is handled by a
//! worker that holds a bidirectional gRPC stream open to the server and runs
//! each event through a chain of middleware.
//!
//! # Architecture
//!
//! - [`middleware`]: the generic middleware composition engine.
//! - [`context`]: typed contexts, one per event source.
//! - [`worker`]: the streaming worker loop and the per-source registrations.
//! - [`Manager`]: runs every registered worker and collects their failures.
//!
//! # Example Flow
//!
//! ```text
//! Worker                                     Server
//! │                                           │
//! │  RegistrationRequest{topic: "orders"}     │
//! │ ─────────────────────────────────────────>│
//! │                                           │
//! │       MessageRequest{id: "7"}             │
//! │<───────────────────────────────────────── │
//! │                                           │
//!      middleware(ctx, identity)
//! │                                           │
//! │  MessageResponse{id: "7", success: true}  │
//! │ ─────────────────────────────────────────>│
//! ```

pub mod proto {
    #![allow(missing_docs)]
    #![allow(clippy::doc_markdown)]

    pub mod apis {
        tonic::include_proto!("nitric.proto.apis.v1");
    }

    pub mod topics {
        tonic::include_proto!("nitric.proto.topics.v1");
    }

    pub mod schedules {
        tonic::include_proto!("nitric.proto.schedules.v1");
    }

    pub mod storage {
        tonic::include_proto!("nitric.proto.storage.v1");
    }

    pub mod websockets {
        tonic::include_proto!("nitric.proto.websockets.v1");
    }

    pub mod batch {
        tonic::include_proto!("nitric.proto.batch.v1");
    }

    pub mod faas {
        tonic::include_proto!("nitric.proto.faas.v1");
    }
}

mod config;
mod connection;
pub mod context;
mod error;
mod manager;
pub mod middleware;
pub mod worker;

pub use config::{BUILD_ENVIRONMENT, Config};
pub use connection::connect;
pub use context::{
    BlobEventContext, EventResponse, FileEventContext, HttpContext, IntervalContext, JobContext,
    MessageContext, TriggerContext, WebsocketContext,
};
pub use error::{Error, WorkerErrors};
pub use manager::Manager;
pub use middleware::{Handler, Middleware, compose};
pub use worker::{
    ApiRoute, BucketNotification, JobRegistration, Schedule, Shutdown, ShutdownHandle,
    StreamWorker, Subscription, TriggerHandlers, WebsocketRegistration, Worker,
};
