use super::types::NotificationTarget;

/// Context given to mentions found in `options.escalation_message`.
pub const ESCALATION_CONTEXT: &str = "escalation";

const RECOVERY_BLOCK: &str = "is_recovery";

// A mention ends at whitespace or any of these.
const MENTION_END: &[char] = &[',', ';', '(', ')', '<', '>', '"', '\'', '{', '}'];
// Besides whitespace, a mention may directly follow these.
const MENTION_AFTER: &[char] = &['(', ',', '>'];
const TRAILING: &[char] = &['.', ':', '!', '?'];

/// Extracts `@target` mentions from a monitor message and its escalation
/// message.
///
/// Mentions inside `{{#block}}` / `{{^block}}` sections carry the innermost
/// block as context (`^` kept for inverted blocks). Duplicate
/// `(target, context)` pairs are collapsed, first occurrence wins.
pub fn parse_targets(message: Option<&str>, escalation: Option<&str>) -> Vec<NotificationTarget> {
    let mut targets = Vec::new();
    if let Some(text) = message {
        collect(text, None, &mut targets);
    }
    if let Some(text) = escalation {
        collect(text, Some(ESCALATION_CONTEXT), &mut targets);
    }
    targets
}

fn collect(text: &str, fallback: Option<&str>, out: &mut Vec<NotificationTarget>) {
    let mut blocks: Vec<String> = Vec::new();
    let mut prev: Option<char> = None;
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        let rest = &text[pos..];

        if rest.starts_with("{{") {
            if let Some(end) = rest[2..].find("}}") {
                apply_block_tag(rest[2..2 + end].trim(), &mut blocks);
                pos += end + 4;
                prev = None;
                continue;
            }
        }

        if c == '@' && prev.map_or(true, |p| p.is_whitespace() || MENTION_AFTER.contains(&p)) {
            let body = &rest[1..];
            let len = body
                .find(|ch: char| ch.is_whitespace() || MENTION_END.contains(&ch))
                .unwrap_or(body.len());
            let raw = &body[..len];
            // `@slack-{{channel}}` is resolved by Datadog at alert time.
            let templated = body[len..].starts_with('{') && !is_block_tag(&body[len..]);
            let target = raw.trim_end_matches(TRAILING);

            if !target.is_empty() && !templated {
                push(out, target, blocks.last().map(String::as_str).or(fallback));
            }

            pos += 1 + len;
            prev = Some(raw.chars().last().unwrap_or('@'));
            continue;
        }

        prev = Some(c);
        pos += c.len_utf8();
    }
}

fn is_block_tag(s: &str) -> bool {
    s.strip_prefix("{{").map(str::trim_start).map_or(false, |t| {
        t.starts_with(&['#', '^', '/'][..]) || is_else(t)
    })
}

fn is_else(tag: &str) -> bool {
    tag.strip_prefix("else")
        .map_or(false, |rest| rest.starts_with('}') || rest.starts_with(char::is_whitespace) || rest.is_empty())
}

fn apply_block_tag(tag: &str, blocks: &mut Vec<String>) {
    let first_word = |s: &str| s.split_whitespace().next().unwrap_or("").to_string();

    if let Some(name) = tag.strip_prefix('#') {
        blocks.push(first_word(name));
    } else if let Some(name) = tag.strip_prefix('^') {
        blocks.push(format!("^{}", first_word(name)));
    } else if let Some(name) = tag.strip_prefix('/') {
        let name = first_word(name);
        if let Some(idx) = blocks.iter().rposition(|b| b.trim_start_matches('^') == name) {
            blocks.truncate(idx);
        }
    } else if is_else(tag) {
        // `{{else}}` flips the innermost block.
        if let Some(top) = blocks.last_mut() {
            let flipped = match top.strip_prefix('^') {
                Some(name) => name.to_string(),
                None => format!("^{}", top),
            };
            *top = flipped;
        }
    }
}

fn push(out: &mut Vec<NotificationTarget>, target: &str, context: Option<&str>) {
    let exists = out
        .iter()
        .any(|t| t.target == target && t.context.as_deref() == context);
    if exists {
        return;
    }

    out.push(NotificationTarget {
        target: target.to_string(),
        context: context.map(str::to_string),
        is_recovery: context == Some(RECOVERY_BLOCK),
    });
}
