//! Descriptor normalization: resolve, materialize, dispatch.

pub mod dispatcher;
pub mod materializer;
pub mod resolver;

pub use dispatcher::{alt_text, DeliveryMethod, Dispatcher};
pub use materializer::{data_uri_from_base64, mime_for_extension, Materializer};
pub use resolver::{resolve, Resolution};

use crate::models::{ImageDescriptor, ResolvedImage};

/// Runs descriptors through the resolver and materializer, dropping failures.
pub fn normalize(descriptors: &[ImageDescriptor], materializer: &Materializer) -> Vec<ResolvedImage> {
    let total = descriptors.len();
    log::info!("Processing {} descriptor(s)", total);

    let mut images = Vec::with_capacity(total);
    for (idx, descriptor) in descriptors.iter().enumerate() {
        log::info!("Descriptor {}/{} ({})", idx + 1, total, descriptor.kind_name());
        log::debug!("Descriptor contents: {:?}", descriptor);

        let resolution = resolve(descriptor);
        if let Resolution::Unrecognized(_) = resolution {
            log::warn!("Descriptor {} not recognized, passing its text through", idx + 1);
        }

        match materializer.finish(resolution) {
            Some(image) => {
                log::info!("Descriptor {} processed", idx + 1);
                images.push(image);
            }
            None => log::error!("Could not process descriptor {}", idx + 1),
        }
    }
    images
}
