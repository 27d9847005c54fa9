/// Address-space selector for a scatter handle.
///
/// Mirrors the acquisition backend's own encoding: the all-ones value is a
/// sentinel for physical memory, the top bit is a modifier OR-ed onto a
/// process id to request kernel-mapped virtual addressing, and any other
/// value is a plain user-mode process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u32);

/// Sentinel selecting physical memory rather than a process address space.
pub const PHYSICAL: u32 = u32::MAX;

/// Flag bit OR-ed onto a process id to request kernel-mapped virtual
/// addressing in addition to the user-mode space.
pub const WITH_KERNEL_MEMORY: u32 = 1 << 31;

/// The address class a [`TargetId`] resolves to, used to pick which
/// validation rule an address must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Physical,
    UserVirtual,
    UserAndKernelVirtual,
}

impl TargetId {
    pub const PHYSICAL: TargetId = TargetId(PHYSICAL);

    /// A plain user-mode process id, without the kernel-memory modifier.
    pub fn process(pid: u32) -> TargetId {
        TargetId(pid & !WITH_KERNEL_MEMORY)
    }

    /// A process id with the kernel-memory modifier set.
    pub fn process_with_kernel(pid: u32) -> TargetId {
        TargetId((pid & !WITH_KERNEL_MEMORY) | WITH_KERNEL_MEMORY)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_physical(self) -> bool {
        self.0 == PHYSICAL
    }

    pub fn has_kernel_memory(self) -> bool {
        !self.is_physical() && (self.0 & WITH_KERNEL_MEMORY) != 0
    }

    pub fn pid(self) -> Option<u32> {
        if self.is_physical() {
            None
        } else {
            Some(self.0 & !WITH_KERNEL_MEMORY)
        }
    }

    pub fn address_class(self) -> AddressClass {
        if self.is_physical() {
            AddressClass::Physical
        } else if self.has_kernel_memory() {
            AddressClass::UserAndKernelVirtual
        } else {
            AddressClass::UserVirtual
        }
    }
}

impl From<u32> for TargetId {
    fn from(raw: u32) -> Self {
        TargetId(raw)
    }
}
