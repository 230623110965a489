//! Request and info structures exchanged with drivers
//!
//! Every info structure carries an [`Iid`](crate::Iid). Drivers populate
//! only the system id; the runtime fills in user names on the way out.

pub mod disk;
pub mod filesystem;
pub mod keypair;
pub mod myimage;
pub mod nlb;
pub mod security;
pub mod tag;
pub mod vm;
pub mod vpc;

pub use disk::{DiskInfo, DiskReqInfo, DiskStatus};
pub use filesystem::{FileSystemInfo, FileSystemReqInfo, FileSystemStatus};
pub use keypair::{KeyPairInfo, KeyPairReqInfo};
pub use myimage::{MyImageInfo, MyImageReqInfo, MyImageStatus};
pub use nlb::{HealthCheckerInfo, HealthInfo, ListenerInfo, NlbInfo, NlbReqInfo, VmGroupInfo};
pub use security::{RuleDirection, SecurityInfo, SecurityReqInfo, SecurityRule};
pub use tag::{KeyValue, TagInfo};
pub use vm::{ImageType, Platform, RegionInfo, VmControl, VmInfo, VmReqInfo, VmStatus, VmStatusInfo};
pub use vpc::{SubnetInfo, VpcInfo, VpcReqInfo};
