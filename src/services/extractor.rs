//! 字段提取 - 业务能力层
//!
//! 只负责"从一个候选块里拿出题干、选项、答案"，永不失败：
//! 缺失的字段落到默认值（空选项、答案占位值、空题干），由校验器决定去留。
//!
//! ## 分隔文本的提取顺序
//!
//! 1. 答案标记：先找 `Suggested Answer: X`，再找 `**Answer: X**`；
//!    找到后只保留标记之前的文本继续处理
//! 2. 逐行扫描选项（两状态的状态机，见 [`ScanState`]）
//! 3. 题干，依次尝试：
//!    1. `[... Questions ...]` 方括号标题之后的文本
//!    2. 含 `Question` 的标题行之后的文本
//!    3. 第一个选项之前累积的题干行
//!
//!    1 和 2 的文本截止到第一个选项（没有选项时截止到答案标记；
//!    两者都没有则不匹配）。清洗后为空的候选跳到下一种。

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{CandidateFields, Options, QuestionBlock, SourceFormat};
use crate::services::normalizer::normalize;

const QUESTION_KEYS: [&str; 4] = ["question", "text", "description", "prompt"];
// `correct` 是阶段 A 的 JSON 产物自己的字段名，排在最后
const ANSWER_KEYS: [&str; 5] = [
    "suggested_answer",
    "correct_answer",
    "answer",
    "correctAnswer",
    "correct",
];
const OPTION_KEYS: [&str; 3] = ["options", "choices", "answers"];
const OPTION_TEXT_KEYS: [&str; 4] = ["text", "value", "option", "label"];

static SUGGESTED_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Suggested Answer:\s*([A-Z]{1,5}(?:[ \t]*,[ \t]*[A-Z]{1,5}|[ \t]+[A-Z]{1,5})*)\b")
        .unwrap()
});

static BOLD_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Answer:\s*([A-Z]{1,5}(?:[ \t]*,[ \t]*[A-Z]{1,5}|[ \t]+[A-Z]{1,5})*)\s*\*\*")
        .unwrap()
});

static LETTER_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z](?:[\s,]*[A-Z])*$").unwrap());

static BRACKET_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[[^\]\n]*questions[^\]\n]*\]").unwrap());

static QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)question[^\n]*\n").unwrap());

static QUESTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^question\s*(?:#\s*)?(?:\d+\s*[:.)-]?|[:.)-])\s*").unwrap()
});

static TRAILING_OPTIONS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\boptions\s*:?$").unwrap());

/// 字段提取器
///
/// 唯一的可配置项是"未找到答案"时的占位值（`N/A` 或 `Not found`，视调用方而定）。
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    answer_sentinel: String,
}

impl FieldExtractor {
    pub fn new(answer_sentinel: impl Into<String>) -> Self {
        Self {
            answer_sentinel: answer_sentinel.into(),
        }
    }

    pub fn answer_sentinel(&self) -> &str {
        &self.answer_sentinel
    }

    /// 提取一个候选块的字段
    pub fn extract(&self, block: &QuestionBlock) -> CandidateFields {
        match block {
            QuestionBlock::Text(text) => self.extract_text(text),
            QuestionBlock::Element(element) => self.extract_element(element),
        }
    }

    fn extract_text(&self, block: &str) -> CandidateFields {
        let (suggested_answer, body) = match find_answer(block) {
            Some((letters, marker_start)) => (Some(letters), &block[..marker_start]),
            None => (None, block),
        };

        let scan = scan_lines(body);

        let region = match scan.question_end {
            Some(end) => Some(&body[..end]),
            None if suggested_answer.is_some() => Some(body),
            None => None,
        };

        let question_text = region
            .and_then(|r| after_match(&BRACKET_HEADER, r))
            .or_else(|| region.and_then(|r| after_match(&QUESTION_LINE, r)))
            .or_else(|| question_from_lines(&scan.question_lines))
            .unwrap_or_default();

        CandidateFields {
            question_text,
            options: scan.options,
            suggested_answer: suggested_answer.unwrap_or_else(|| self.answer_sentinel.clone()),
            format: SourceFormat::DelimitedText,
            raw_source: block.to_string(),
        }
    }

    fn extract_element(&self, element: &Value) -> CandidateFields {
        let raw_source = match element {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let Value::Object(map) = element else {
            return CandidateFields {
                question_text: render_scalar(element).unwrap_or_default(),
                options: Options::new(),
                suggested_answer: self.answer_sentinel.clone(),
                format: SourceFormat::StructuredList,
                raw_source,
            };
        };

        let question_text = first_non_empty(map, &QUESTION_KEYS)
            .and_then(render_scalar)
            .unwrap_or_else(|| raw_source.clone());

        let suggested_answer = first_non_empty(map, &ANSWER_KEYS)
            .and_then(render_answer)
            .unwrap_or_else(|| self.answer_sentinel.clone());

        let options = first_non_empty(map, &OPTION_KEYS)
            .map(render_options)
            .unwrap_or_default();

        CandidateFields {
            question_text,
            options,
            suggested_answer,
            format: SourceFormat::StructuredList,
            raw_source,
        }
    }
}

/// 答案字母规范化：按逗号/空白拆分后用逗号连接（`"A, C"` → `"A,C"`）
pub fn normalize_answer(letters: &str) -> String {
    letters
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// 返回 (规范化后的答案, 标记起始位置)
fn find_answer(block: &str) -> Option<(String, usize)> {
    SUGGESTED_ANSWER
        .captures(block)
        .or_else(|| BOLD_ANSWER.captures(block))
        .and_then(|caps| {
            let start = caps.get(0)?.start();
            let letters = caps.get(1)?.as_str();
            Some((normalize_answer(letters), start))
        })
}

/// 匹配之后、区域结尾之前的文本，清洗后非空才算命中
fn after_match(pattern: &Regex, region: &str) -> Option<String> {
    let m = pattern.find(region)?;
    clean_question(&region[m.end()..])
}

fn question_from_lines(lines: &[&str]) -> Option<String> {
    let joined = lines.join("\n");
    let text = normalize(&joined);
    let text = QUESTION_LABEL.replace(&text, "");
    clean_question(&text)
}

fn clean_question(text: &str) -> Option<String> {
    let text = normalize(text);
    let text = TRAILING_OPTIONS_LABEL.replace(&text, "");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

// ========== 选项扫描状态机 ==========

/// 逐行扫描的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// 尚未遇到选项，行累积为题干
    InQuestionText,
    /// 正在累积某个选项的（可能多行的）内容
    InOption(char),
}

/// 选项字母后的分隔形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    /// `A.` 或 `A)`
    Punct,
    /// `A foo`
    Space,
}

#[derive(Debug, Default)]
struct LineScan<'a> {
    question_lines: Vec<&'a str>,
    options: Options,
    /// 第一个选项行在文本中的字节偏移
    question_end: Option<usize>,
}

/// 解析行首的选项标记：单个大写字母 + `.` / `)` / 空白
fn option_marker(line: &str) -> Option<(char, Separator, &str)> {
    let trimmed = line.trim_start();
    let mut chars = trimmed.chars();
    let letter = chars.next().filter(char::is_ascii_uppercase)?;
    let sep = chars.next()?;
    let separator = match sep {
        '.' | ')' => Separator::Punct,
        c if c.is_whitespace() => Separator::Space,
        _ => return None,
    };
    let rest = trimmed[letter.len_utf8() + sep.len_utf8()..].trim();
    if separator == Separator::Space && rest.is_empty() {
        return None;
    }
    Some((letter, separator, rest))
}

fn next_letter(letter: char) -> Option<char> {
    match letter {
        'A'..='Y' => char::from_u32(letter as u32 + 1),
        _ => None,
    }
}

fn is_options_label(line: &str) -> bool {
    line.trim().trim_end_matches(':').eq_ignore_ascii_case("options")
}

/// 逐行扫描，转移规则：
///
/// - `InQuestionText`：`A.`/`B)` 这类标点形式的标记开启选项；空白形式（`A foo`）
///   只在字母为 `A` 且下一个非空行是 `B` 标记时才算，避免把 "A company ..."
///   这样的题干行误判为选项
/// - `InOption(k)`：标点形式且字母尚未出现 → 新选项；空白形式只接受 `k` 的下一个字母；
///   其他非空行追加到当前选项（单个空格连接）
fn scan_lines(body: &str) -> LineScan<'_> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        lines.push((offset, line.trim_end_matches(['\n', '\r'])));
        offset += line.len();
    }

    let mut scan = LineScan::default();
    let mut state = ScanState::InQuestionText;
    let mut current: Vec<&str> = Vec::new();

    for (idx, &(offset, line)) in lines.iter().enumerate() {
        let marker = option_marker(line).filter(|&(letter, separator, _)| {
            starts_option(state, letter, separator, &scan.options, || {
                lines[idx + 1..]
                    .iter()
                    .map(|(_, l)| *l)
                    .find(|l| !l.trim().is_empty())
            })
        });

        match (state, marker) {
            (_, Some((letter, _, rest))) => {
                if let ScanState::InOption(previous) = state {
                    flush_option(&mut scan.options, previous, &current);
                }
                scan.question_end.get_or_insert(offset);
                // 占位，保证后续同字母标记被当作续行
                scan.options.entry(letter).or_default();
                current.clear();
                if !rest.is_empty() {
                    current.push(rest);
                }
                state = ScanState::InOption(letter);
            }
            (ScanState::InQuestionText, None) => {
                if !line.trim().is_empty() && !is_options_label(line) {
                    scan.question_lines.push(line);
                }
            }
            (ScanState::InOption(_), None) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    current.push(trimmed);
                }
            }
        }
    }

    if let ScanState::InOption(letter) = state {
        flush_option(&mut scan.options, letter, &current);
    }
    scan.options.retain(|_, text| !text.is_empty());
    scan
}

fn starts_option<'a>(
    state: ScanState,
    letter: char,
    separator: Separator,
    options: &Options,
    next_non_blank: impl FnOnce() -> Option<&'a str>,
) -> bool {
    if options.contains_key(&letter) {
        return false;
    }
    match (state, separator) {
        (_, Separator::Punct) => true,
        (ScanState::InQuestionText, Separator::Space) => {
            letter == 'A'
                && next_non_blank()
                    .and_then(option_marker)
                    .is_some_and(|(next, _, _)| next == 'B')
        }
        (ScanState::InOption(current), Separator::Space) => next_letter(current) == Some(letter),
    }
}

fn flush_option(options: &mut Options, letter: char, parts: &[&str]) {
    options.insert(letter, normalize(&parts.join(" ")));
}

// ========== 结构化元素 ==========

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn first_non_empty<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !is_blank(value))
}

fn render_scalar(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn render_answer(value: &Value) -> Option<String> {
    let text = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(render_scalar)
            .collect::<Vec<_>>()
            .join(","),
        other => render_scalar(other)?,
    };
    if LETTER_LIST.is_match(&text) {
        Some(normalize_answer(&text))
    } else {
        (!text.is_empty()).then_some(text)
    }
}

fn render_options(value: &Value) -> Options {
    let mut options = Options::new();
    match value {
        Value::Object(map) => {
            let lettered = map.keys().all(|key| single_letter(key).is_some());
            for (idx, (key, item)) in map.iter().enumerate() {
                let letter = if lettered {
                    single_letter(key)
                } else {
                    position_letter(idx)
                };
                if let (Some(letter), Some(text)) = (letter, render_option_text(item)) {
                    options.insert(letter, text);
                }
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                let Some(text) = render_option_text(item) else {
                    continue;
                };
                match option_marker(&text) {
                    Some((letter, Separator::Punct, rest))
                        if !rest.is_empty() && !options.contains_key(&letter) =>
                    {
                        options.insert(letter, rest.to_string());
                    }
                    _ => {
                        if let Some(letter) = position_letter(idx) {
                            options.entry(letter).or_insert(text);
                        }
                    }
                }
            }
        }
        Value::String(s) => {
            // 单个字符串里按行写的选项
            options = scan_lines(s).options;
        }
        _ => {}
    }
    options
}

fn render_option_text(item: &Value) -> Option<String> {
    match item {
        Value::Object(map) => first_non_empty(map, &OPTION_TEXT_KEYS)
            .and_then(render_scalar)
            .or_else(|| render_scalar(item)),
        other => render_scalar(other),
    }
}

fn single_letter(key: &str) -> Option<char> {
    let mut chars = key.trim().chars();
    let c = chars.next().filter(char::is_ascii_alphabetic)?;
    chars.next().is_none().then(|| c.to_ascii_uppercase())
}

fn position_letter(idx: usize) -> Option<char> {
    (idx < 26).then(|| (b'A' + idx as u8) as char)
}
