//! # Question Pipeline
//!
//! 把论坛抓取的考试题库整理成结构化题目，并为每道题生成解释
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有存储资源，只暴露读写能力
//! - `BlobStore` - 单桶对象存储抽象，支持范围读取
//! - `FsBlobStore` / `MemoryBlobStore` - 本地目录桶与内存桶
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个块或单条记录
//! - `normalize` / 切分 / `FieldExtractor` / `RecordValidator` - 提取引擎
//! - `StreamingChunkReader` - 大文件流式切分
//! - `ExplanationGenerator` - 解释生成能力
//! - `ArtifactWriter` - 产物写入能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文档"的处理流程
//! - `RecordStream` - 惰性记录流（切分 → 提取 → 校验编号）
//! - `ExtractionFlow` - 阶段 A：原始文档 → JSON + 整理稿
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 阶段 B：分批生成解释并逐批追加
//! - `orchestrator/dispatcher` - 事件路由、幂等跳过、健康检查
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, LlmProvider};
pub use error::{AppError, AppResult};
pub use infrastructure::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use models::{ExplanationRecord, QuestionBlock, QuestionRecord, SourceFormat};
pub use orchestrator::{BatchExplanationDriver, Dispatcher, HealthReport, Outcome};
pub use services::{ExplanationGenerator, FieldExtractor, RecordValidator, StreamingChunkReader};
pub use workflow::{ExtractionFlow, ExtractionOutcome, RecordStream};
