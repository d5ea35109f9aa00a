//! Built-in plugins for ironcast
//!
//! A small set of builders, provisioners and post-processors that ship in
//! the box. Platform builders register through the same factory surface
//! from their own crates.

pub mod artifact;
pub mod checksum;
pub mod file;
pub mod manifest;
pub mod shell;

use ironcast_core::builder::Builder;
use ironcast_core::postprocessor::PostProcessor;
use ironcast_core::provisioner::Provisioner;

pub use artifact::FileArtifact;
pub use checksum::ChecksumPostProcessor;
pub use file::FileBuilder;
pub use manifest::ManifestPostProcessor;
pub use shell::ShellProvisioner;

/// Look up a built-in builder by template type
pub fn builder(builder_type: &str) -> Option<Box<dyn Builder>> {
    match builder_type {
        "file" => Some(Box::<FileBuilder>::default()),
        _ => None,
    }
}

/// Look up a built-in provisioner by template type
pub fn provisioner(provisioner_type: &str) -> Option<Box<dyn Provisioner>> {
    match provisioner_type {
        "shell" => Some(Box::<ShellProvisioner>::default()),
        _ => None,
    }
}

/// Look up a built-in post-processor by template type
pub fn post_processor(processor_type: &str) -> Option<Box<dyn PostProcessor>> {
    match processor_type {
        "checksum" => Some(Box::<ChecksumPostProcessor>::default()),
        "manifest" => Some(Box::<ManifestPostProcessor>::default()),
        _ => None,
    }
}
