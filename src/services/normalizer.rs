//! 文本清洗
//!
//! 匹配前先把非 ASCII 噪声替换为空格，再折叠空白。

/// 清洗文本
///
/// 1. 可打印 ASCII 以外的字符替换为空格（换行、制表符等空白也参与第 2 步折叠）
/// 2. 连续空白折叠为单个空格
/// 3. 去掉首尾空白
///
/// 纯函数，幂等：`normalize(normalize(x)) == normalize(x)`
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_ascii_graphic() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("  What   is\n\n Azure?\t"), "What is Azure?");
    }

    #[test]
    fn test_replaces_non_ascii() {
        assert_eq!(normalize("Suggested Answer: B 🗳️"), "Suggested Answer: B");
        assert_eq!(normalize("caf\u{e9} au lait"), "caf au lait");
        assert_eq!(normalize("a\u{a0}b"), "a b");
    }

    #[test]
    fn test_empty_and_non_ascii_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t "), "");
        assert_eq!(normalize("题目选项"), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "plain",
            "  mixed \u{2014} dash \r\n line ",
            "题目 A. 选项 B) two",
            "\u{0}control\u{7f}chars",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "sample: {:?}", sample);
        }
    }
}
