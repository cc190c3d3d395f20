//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责事件调度与批量处理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `dispatcher` - 事件分发器
//! - 持有存储与生成器（唯一的资源所有者）
//! - 归一化存储事件、按前缀路由
//! - 输出已存在时跳过
//! - 健康检查
//!
//! ### `batch_processor` - 批量解释处理器
//! - 把记录流按固定大小分批
//! - 逐题调用生成器，逐批追加解释稿
//! - 输出统计信息
//!
//! ## 层次关系
//!
//! ```text
//! dispatcher (处理事件)
//!     ↓
//! batch_processor (阶段 B) / workflow::ExtractionFlow (阶段 A)
//!     ↓
//! workflow::RecordStream (切分 → 提取 → 校验)
//!     ↓
//! services (能力层：segment / extract / validate / explain / write)
//!     ↓
//! infrastructure (基础设施：BlobStore)
//! ```

pub mod batch_processor;
pub mod dispatcher;

pub use batch_processor::{BatchExplanationDriver, ExplanationOutcome, ExplanationStats};
pub use dispatcher::{error_report, Dispatcher, HealthReport, Outcome};
