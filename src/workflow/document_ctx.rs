//! 文档处理上下文
//!
//! 封装"我正在处理哪个对象、什么格式、多大"这一信息

use std::fmt::Display;

use crate::models::SourceFormat;

/// 文档处理上下文
#[derive(Debug, Clone)]
pub struct DocumentCtx {
    /// 对象名（桶内路径）
    pub object_name: String,

    /// 检测到的源格式
    pub format: SourceFormat,

    /// 对象字节数
    pub size: u64,

    /// 是否走流式读取
    pub streaming: bool,
}

impl DocumentCtx {
    pub fn new(object_name: &str, format: SourceFormat, size: u64, streaming: bool) -> Self {
        Self {
            object_name: object_name.to_string(),
            format,
            size,
            streaming,
        }
    }
}

impl Display for DocumentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[文档 {} | {} | {} 字节{}]",
            self.object_name,
            self.format,
            self.size,
            if self.streaming { " | 流式" } else { "" }
        )
    }
}
