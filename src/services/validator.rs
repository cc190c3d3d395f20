//! 记录校验与编号
//!
//! 分隔文本的候选字段要过两道门槛（题干长度、选项数量），
//! 结构化元素总是接受。编号只分配给被接受的记录，从 1 开始连续递增。

use tracing::debug;

use crate::models::{CandidateFields, QuestionRecord, SourceFormat};

/// 题干最少字符数（清洗后）
pub const MIN_QUESTION_LEN: usize = 15;

/// 最少选项数
pub const MIN_OPTIONS: usize = 2;

/// 带编号状态的校验器，一个文档一个实例
#[derive(Debug, Default)]
pub struct RecordValidator {
    accepted: usize,
    rejected: usize,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 判断候选字段是否构成合格题目（不改变状态）
    pub fn is_acceptable(candidate: &CandidateFields) -> bool {
        match candidate.format {
            SourceFormat::StructuredList => true,
            SourceFormat::DelimitedText => {
                candidate.question_text.chars().count() >= MIN_QUESTION_LEN
                    && candidate.options.len() >= MIN_OPTIONS
            }
        }
    }

    /// 校验并编号
    ///
    /// # 返回
    /// 接受时返回带编号的记录，拒绝时返回 `None`
    pub fn accept(&mut self, candidate: CandidateFields) -> Option<QuestionRecord> {
        if !Self::is_acceptable(&candidate) {
            self.rejected += 1;
            debug!(
                "丢弃候选块: 题干 {} 字符, {} 个选项",
                candidate.question_text.chars().count(),
                candidate.options.len()
            );
            return None;
        }
        self.accepted += 1;
        Some(QuestionRecord::from_candidate(self.accepted, candidate))
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}
