pub mod connections;
pub mod domain;
pub mod error;
pub mod graph;
pub mod memory;
pub mod messages;
pub mod ports;
pub mod profile;

pub use connections::{ConnectionPolicy, ConnectionRequestService};
pub use domain::{
    AuthSession, ConnectionEdge, ConnectionStatus, Decision, EducationDetail, EducationInput,
    Message, MessageId, MessageStatus, User, UserCredentials, UserId, WorkExperience,
    WorkExperienceInput,
};
pub use error::{NetworkError, NetworkResult};
pub use graph::{ConnectionGraph, MAX_REQUEST_DEGREE};
pub use memory::MemoryStore;
pub use messages::MessageStore;
pub use ports::{
    AuthSessionStore, MessageView, PortError, PortResult, ProfileDirectory, Store,
    StoreTransaction,
};
pub use profile::{ProfileService, ProfileView, Relation};
