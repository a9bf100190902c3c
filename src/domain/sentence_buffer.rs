//! 流式句子缓冲
//!
//! 将 LLM 流式返回的增量文本累积成"类句子"片段，供下游逐句合成语音

/// 触发刷新所需的最小已缓冲字符数（严格大于）
const MIN_BUFFERED_CHARS: usize = 3;

/// 检查是否为句末终止符（含全角形式）
#[inline]
fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '\n' | '。' | '！' | '？')
}

/// 片段中是否含有终止符
#[inline]
fn contains_terminator(fragment: &str) -> bool {
    fragment.chars().any(is_terminator)
}

/// 句子缓冲器
///
/// 规则：
/// 1. 片段含终止符，且追加前缓冲区字符数 > 3 时，连同该片段一起输出
/// 2. 否则继续累积
/// 3. 流结束时，剩余的非空内容作为最后一个片段输出
#[derive(Debug, Default, Clone)]
pub struct SentenceBuffer {
    buffer: String,
}

impl SentenceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个增量片段，满足刷新条件时返回一个完整片段
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        let buffered_chars = self.buffer.chars().count();
        self.buffer.push_str(fragment);

        if contains_terminator(fragment) && buffered_chars > MIN_BUFFERED_CHARS {
            let chunk = std::mem::take(&mut self.buffer);
            let trimmed = chunk.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(trimmed.to_string());
        }

        None
    }

    /// 流结束时取出剩余内容
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let trimmed = rest.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// 当前缓冲的原始内容
    #[cfg(test)]
    fn pending(&self) -> &str {
        &self.buffer
    }
}
