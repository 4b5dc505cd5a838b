//! Resource vectors and capacity arithmetic

use serde::{Deserialize, Serialize};

/// Amount of RAM, CPU and GPU in fixed units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resources {
    /// Memory units (MiB in the reference deployment)
    pub ram: u64,
    /// CPU units
    pub cpu: u64,
    /// GPU units
    pub gpu: u64,
}

impl Resources {
    pub const ZERO: Resources = Resources {
        ram: 0,
        cpu: 0,
        gpu: 0,
    };

    pub fn new(ram: u64, cpu: u64, gpu: u64) -> Self {
        Self { ram, cpu, gpu }
    }

    /// True when every dimension of `self` is covered by `available`
    pub fn fits_within(&self, available: &Resources) -> bool {
        self.ram <= available.ram && self.cpu <= available.cpu && self.gpu <= available.gpu
    }

    /// Subtract `other` from every dimension, or `None` if any would underflow
    pub fn checked_sub(&self, other: &Resources) -> Option<Resources> {
        Some(Resources {
            ram: self.ram.checked_sub(other.ram)?,
            cpu: self.cpu.checked_sub(other.cpu)?,
            gpu: self.gpu.checked_sub(other.gpu)?,
        })
    }

    /// Add `other` to every dimension, or `None` on overflow
    pub fn checked_add(&self, other: &Resources) -> Option<Resources> {
        Some(Resources {
            ram: self.ram.checked_add(other.ram)?,
            cpu: self.cpu.checked_add(other.cpu)?,
            gpu: self.gpu.checked_add(other.gpu)?,
        })
    }
}

impl std::fmt::Display for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ram={} cpu={} gpu={}", self.ram, self.cpu, self.gpu)
    }
}
