use crate::domain::{Citation, EvalRow, QualityGate, Scores, Thresholds};
use crate::error::AppError;
use crate::normalize::tokens;

/// Question terms that mark a request as outside the supported domain.
pub const OUT_OF_SCOPE_TERMS: [&str; 3] = ["weather", "sports", "stocks"];
/// Answer phrases that count as an explicit refusal.
pub const REFUSAL_MARKERS: [&str; 2] = ["healthcare", "provide a domain-specific"];

pub fn is_out_of_scope(question: &str) -> bool {
    let q = question.to_lowercase();
    OUT_OF_SCOPE_TERMS.iter().any(|t| q.contains(t))
}

pub fn citation_coverage(answer: &str, citations: &[Citation]) -> f64 {
    if !answer.is_empty() && !citations.is_empty() {
        1.0
    } else {
        0.0
    }
}

/// Share of distinct answer tokens that also appear somewhere in the cited text.
pub fn groundedness_proxy(answer: &str, citations: &[Citation]) -> f64 {
    if answer.is_empty() || citations.is_empty() {
        return 0.0;
    }
    let answer_tokens = tokens(answer);
    if answer_tokens.is_empty() {
        return 0.0;
    }
    let cited = citations
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let cited_tokens = tokens(&cited);
    let shared = answer_tokens.intersection(&cited_tokens).count();
    shared as f64 / answer_tokens.len() as f64
}

pub fn refusal_policy(question: &str, answer: &str) -> f64 {
    if !is_out_of_scope(question) {
        return 1.0;
    }
    let a = answer.to_lowercase();
    if REFUSAL_MARKERS.iter().any(|m| a.contains(m)) {
        1.0
    } else {
        0.0
    }
}

/// Score one answered item.
///
/// An out-of-scope question that was correctly refused earns full citation coverage even
/// though a refusal carries no citations.
pub fn score_item(question: &str, answer: &str, citations: &[Citation]) -> Scores {
    let refusal = refusal_policy(question, answer);
    let coverage = if is_out_of_scope(question) && refusal == 1.0 {
        1.0
    } else {
        citation_coverage(answer, citations)
    };
    Scores {
        citation_coverage: coverage,
        groundedness_proxy: groundedness_proxy(answer, citations),
        refusal_policy: refusal,
    }
}

/// Arithmetic mean of each score across rows.
pub fn aggregate(rows: &[EvalRow]) -> Result<Scores, AppError> {
    if rows.is_empty() {
        return Err(AppError::new("EVAL_EMPTY_SET", "empty evaluation set"));
    }
    let n = rows.len() as f64;
    let mut sum = Scores {
        citation_coverage: 0.0,
        groundedness_proxy: 0.0,
        refusal_policy: 0.0,
    };
    for r in rows {
        sum.citation_coverage += r.scores.citation_coverage;
        sum.groundedness_proxy += r.scores.groundedness_proxy;
        sum.refusal_policy += r.scores.refusal_policy;
    }
    Ok(Scores {
        citation_coverage: sum.citation_coverage / n,
        groundedness_proxy: sum.groundedness_proxy / n,
        refusal_policy: sum.refusal_policy / n,
    })
}

/// Passes iff both gated metrics meet or exceed their thresholds.
pub fn quality_gate(aggregate: &Scores, thresholds: Thresholds) -> QualityGate {
    let pass = aggregate.citation_coverage >= thresholds.citation_coverage
        && aggregate.groundedness_proxy >= thresholds.groundedness_proxy;
    QualityGate { pass, thresholds }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cite(text: &str) -> Citation {
        Citation {
            source_id: "s".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn groundedness_counts_distinct_answer_tokens() {
        let g = groundedness_proxy("alpha beta beta gamma delta", &[cite("ALPHA beta"), cite("zeta")]);
        assert_eq!(g, 0.5);
        assert_eq!(groundedness_proxy("", &[cite("x")]), 0.0);
        assert_eq!(groundedness_proxy("x", &[]), 0.0);
        assert_eq!(groundedness_proxy("   ", &[cite("x")]), 0.0);
    }

    #[test]
    fn refusal_only_matters_out_of_scope() {
        assert_eq!(refusal_policy("clinical trials?", "nope"), 1.0);
        assert_eq!(refusal_policy("Weather today?", "It is sunny"), 0.0);
        assert_eq!(
            refusal_policy("Weather today?", "Please provide a domain-specific question."),
            1.0
        );
    }
}
