//! BufferedSlotMap: a read-only front map paired with a writable back map.
//!
//! Readers use the front for a whole frame while writers fill the back. At the
//! frame boundary [`BufferedSlotMap::swap_buffers`] publishes the back as the
//! new front. The new back starts either empty or as a copy of what was just
//! published, so handles stay meaningful across frames.

use crate::config::StorageConfig;
use crate::error::ConfigError;
use crate::memory::{default_resource, SharedResource};
use crate::slot_map::SlotMap;
use crate::sync::{FullSync, SyncPolicy};

pub struct BufferedSlotMap<T, Id, P: SyncPolicy = FullSync> {
    front: SlotMap<T, Id, P>,
    back: SlotMap<T, Id, P>,
    clear_on_swap: bool,
}

impl<T, Id: PartialEq, P: SyncPolicy> BufferedSlotMap<T, Id, P> {
    /// Both maps use `config`; its `read_only` flag is ignored.
    ///
    /// With `clear_on_swap` the back map is emptied after every swap instead of
    /// being refilled from the published front.
    pub fn with_config(config: StorageConfig, clear_on_swap: bool) -> Result<Self, ConfigError> {
        Self::with_config_in(config, clear_on_swap, default_resource())
    }

    pub fn with_config_in(
        config: StorageConfig,
        clear_on_swap: bool,
        resource: SharedResource,
    ) -> Result<Self, ConfigError> {
        let config = config.with_read_only(false);
        let front = SlotMap::with_config_in(config, resource.clone())?;
        let back = SlotMap::with_config_in(config, resource)?;
        front.set_read_only(true);
        log::debug!("buffered slot map: clear_on_swap={clear_on_swap}");
        Ok(Self {
            front,
            back,
            clear_on_swap,
        })
    }

    /// The published map. Always read-only.
    #[inline]
    pub fn front(&self) -> &SlotMap<T, Id, P> {
        &self.front
    }

    /// The map writers fill during the current frame.
    #[inline]
    pub fn back(&self) -> &SlotMap<T, Id, P> {
        &self.back
    }

    pub fn clears_on_swap(&self) -> bool {
        self.clear_on_swap
    }
}

impl<T: Clone, Id: Clone + PartialEq, P: SyncPolicy> BufferedSlotMap<T, Id, P> {
    /// Publish the back map and start a new back map.
    pub fn swap_buffers(&mut self) {
        core::mem::swap(&mut self.front, &mut self.back);
        self.front.set_read_only(true);
        self.back.set_read_only(false);
        if self.clear_on_swap {
            self.back.clear();
        } else {
            self.back.copy_from(&self.front);
        }
        log::trace!("buffered slot map: published {} entries", self.front.size());
    }
}
