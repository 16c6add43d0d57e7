//! Screening API clients
//!
//! - `transport`: injected HTTP capability (reqwest in production)
//! - `upload`: multipart clip upload
//! - `graphql`: query/mutation envelope
//! - `invites`: invite records with re-fetch-on-write

pub mod graphql;
pub mod invites;
pub mod transport;
pub mod upload;

pub use graphql::{GraphqlClient, GraphqlError, GraphqlErrorMessage};
pub use invites::{Invite, InviteDataClient, InviteError, InviteResult, QuickTag};
pub use transport::{
    FormPart, HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, ReqwestTransport,
    TransportError,
};
pub use upload::{UploadAck, UploadClient, UploadError};
