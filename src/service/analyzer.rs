//! Lightweight text analysis for captured conversations.
//!
//! Pattern-template extraction of insights and action items, behind a
//! strategy trait so a model-based extractor can replace it without
//! touching the service contract.

use regex::Regex;

/// Extraction strategy used by the memory service.
pub trait TextAnalyzer: Send + Sync {
    /// Up to `limit` notable realizations, preferences, or goals.
    fn extract_insights(&self, content: &str, limit: usize) -> Vec<String>;

    /// Up to `limit` de-duplicated follow-up items.
    fn extract_action_items(&self, content: &str, limit: usize) -> Vec<String>;

    /// Heuristic message count for a raw conversation transcript.
    fn estimate_message_count(&self, content: &str) -> u32;
}

/// Longest capture kept per extracted item.
const MAX_CAPTURE_LEN: usize = 150;

pub struct PatternAnalyzer {
    insight_patterns: Vec<Regex>,
    action_patterns: Vec<Regex>,
    turn_marker: Regex,
}

impl Default for PatternAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternAnalyzer {
    pub fn new() -> Self {
        let insight_patterns = [
            r"(?i)\b(?:learned|learnt|realized|realised|discovered|understood)\s+(?:that\s+)?([^.!?\n]+)",
            r"(?i)\bnow\s+(?:i\s+)?understand\s+(?:that\s+)?([^.!?\n]+)",
            r"(?i)\b(?:i|we|they|user)\s+prefers?\s+([^.!?\n]+)",
            r"(?i)\b(?:my|our|the)\s+goal\s+(?:is|was)\s+(?:to\s+)?([^.!?\n]+)",
        ];
        let action_patterns = [
            r"(?i)\b(?:need(?:s)?\s+to|have\s+to|must)\s+([^.!?\n]+)",
            r"(?i)\bshould\s+([^.!?\n]+)",
            r"(?i)\btodo:?\s*([^\n]+)",
            r"(?mi)^\s*[-*]\s*\[\s*\]\s*(.+)$",
        ];
        Self {
            insight_patterns: compile(&insight_patterns),
            action_patterns: compile(&action_patterns),
            turn_marker: Regex::new(r"(?i)^\s*(?:user|assistant|human|ai|system)\s*[:>]")
                .expect("static regex"),
        }
    }

    fn capture_all(patterns: &[Regex], content: &str, limit: usize) -> Vec<String> {
        let mut items = Vec::new();
        let mut seen = Vec::new();
        for pattern in patterns {
            for captures in pattern.captures_iter(content) {
                let Some(capture) = captures.get(1) else { continue };
                let item = tidy(capture.as_str());
                if item.len() < 3 {
                    continue;
                }
                let key = item.to_lowercase();
                if seen.contains(&key) {
                    continue;
                }
                seen.push(key);
                items.push(item);
                if items.len() >= limit {
                    return items;
                }
            }
        }
        items
    }
}

impl TextAnalyzer for PatternAnalyzer {
    fn extract_insights(&self, content: &str, limit: usize) -> Vec<String> {
        Self::capture_all(&self.insight_patterns, content, limit)
    }

    fn extract_action_items(&self, content: &str, limit: usize) -> Vec<String> {
        Self::capture_all(&self.action_patterns, content, limit)
    }

    fn estimate_message_count(&self, content: &str) -> u32 {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let markers = lines.iter().filter(|l| self.turn_marker.is_match(l)).count();
        if markers > 0 {
            markers as u32
        } else {
            (lines.len().max(1) as u32).div_ceil(3)
        }
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
}

fn tidy(capture: &str) -> String {
    let mut item = capture.trim().trim_end_matches(['.', ',', ';', ':']).to_string();
    if item.len() > MAX_CAPTURE_LEN {
        // Walk back to a char boundary; a byte-index truncate would panic
        // mid-codepoint.
        let mut cut = MAX_CAPTURE_LEN;
        while !item.is_char_boundary(cut) {
            cut -= 1;
        }
        item.truncate(cut);
        item = format!("{}...", item.trim_end());
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learned_that_yields_insight() {
        let analyzer = PatternAnalyzer::new();
        let insights = analyzer
            .extract_insights("I learned that retries should be idempotent. Other text.", 5);
        assert!(insights.iter().any(|i| i.contains("retries should be idempotent")));
    }

    #[test]
    fn test_todo_yields_action_item() {
        let analyzer = PatternAnalyzer::new();
        let items = analyzer.extract_action_items("TODO: write a test.", 10);
        assert!(items.iter().any(|i| i.contains("write a test")));
    }

    #[test]
    fn test_checkbox_and_dedup() {
        let analyzer = PatternAnalyzer::new();
        let content = "- [ ] ship the release\nWe need to ship the release\n- [ ] update docs";
        let items = analyzer.extract_action_items(content, 10);
        assert!(items.iter().any(|i| i.contains("update docs")));
        // "ship the release" appears twice across patterns but is kept once.
        assert_eq!(items.iter().filter(|i| i.contains("ship the release")).count(), 1);
    }

    #[test]
    fn test_long_multibyte_capture_truncates_cleanly() {
        let analyzer = PatternAnalyzer::new();
        let content = format!("I learned that caf{}", "é".repeat(120));
        let insights = analyzer.extract_insights(&content, 5);
        assert_eq!(insights.len(), 1);
        assert!(insights[0].ends_with("..."));
        assert!(insights[0].len() <= MAX_CAPTURE_LEN + 3);
    }

    #[test]
    fn test_limit_is_respected() {
        let analyzer = PatternAnalyzer::new();
        let content = (0..20)
            .map(|i| format!("I learned that fact number {i} matters."))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(analyzer.extract_insights(&content, 5).len(), 5);
    }

    #[test]
    fn test_message_count_prefers_turn_markers() {
        let analyzer = PatternAnalyzer::new();
        let marked = "user: hi\nassistant: hello\nuser: bye";
        assert_eq!(analyzer.estimate_message_count(marked), 3);

        // No markers: ceil(4 lines / 3).
        let plain = "one\ntwo\nthree\nfour";
        assert_eq!(analyzer.estimate_message_count(plain), 2);

        assert_eq!(analyzer.estimate_message_count("single blob"), 1);
    }
}
