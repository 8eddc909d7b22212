// Repositories for the cadence data model

pub mod lead;
pub mod message;
pub mod send_log;
pub mod settings;

pub use lead::LeadRepository;
pub use message::MessageRepository;
pub use send_log::SendLogRepository;
pub use settings::SettingsRepository;
