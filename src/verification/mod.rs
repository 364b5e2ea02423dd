/// 身份核验系统 (Identity Verification)
///
/// - gate:      面部关键点可见性判定
/// - consensus: 逐帧投票 → 稳定核验结论
pub mod consensus;
pub mod gate;

pub use consensus::{crop_region, ConsensusEngine, FrameVote};
pub use gate::FaceGate;
