pub type PosType = u64;
pub type DepthType = u32;
pub type QualityType = f64;
