//! # Grade Overlay
//!
//! 手写作业自动批改：OCR 识别文字位置，批改模型给出结论，结果绘制回原图。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 数据模型（Models）
//! - `models/` - 几何类型、词框、区域索引、批改结论
//! - `RegionIndex` - 区域 ID ↔ 文字与位置，提示词和叠加图共用
//!
//! ### ② 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - `ArtifactStore`，运行产物的原子写入
//! - `clients/` - `OcrProvider` / `GradingProvider` 及其实现
//!
//! ### ③ 业务能力层（Services / Render）
//! - `BoxGrouper` - 词框 → 区域
//! - `PromptEncoder` - 区域 → 提示词
//! - `CorrectionParser` - 模型响应 → 批改结论 + 警告
//! - `WarnWriter` - 写 warnings.txt
//! - `render/` - 区域预览图、批注排版、叠加图合成
//!
//! ### ④ 流程层（Workflow）
//! - `RunCtx` - 上下文封装（图片 + 输出目录）
//! - `GradingFlow` - 流程编排（OCR → 分组 → 提示词 → 批改 → 解析 → 叠加图）
//!
//! ### ⑤ 应用层
//! - `App` - 凭据预检、选择数据来源、运行并输出统计
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod render;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::{App, RunOptions};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Correction, CorrectionKind, Region, RegionId, RegionIndex, WordBox};
pub use workflow::{GradingFlow, GradingSource, OcrSource, RunCtx, RunReport};
