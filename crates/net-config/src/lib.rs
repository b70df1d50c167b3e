//! Guest Network Configuration
//!
//! Native configuration rendering for every supported network manager, plus
//! the ownership checks used to tell engine-written files from foreign ones.

pub mod artifact;
pub mod ini;
pub mod netplan;
pub mod network_manager;
pub mod networkd;
pub mod wicked;

pub use artifact::{artifact_stem, ConfigArtifact, ConfigRenderer, ARTIFACT_SUFFIX, MARKER_COMMENT};
pub use ini::IniDocument;
pub use netplan::NetplanRenderer;
pub use network_manager::NetworkManagerRenderer;
pub use networkd::NetworkdRenderer;
pub use wicked::WickedRenderer;
