//! Outgoing line builders and message splitting.

/// Longest chunk of message text sent in one `PRIVMSG`.
pub const MAX_MESSAGE_LENGTH: usize = 400;

/// Marker appended to every chunk of a split line except the last.
pub const MORE_MARKER: &str = "<more>";

/// Splits a message into the chunks that are sent as separate lines.
///
/// Each input line becomes one or more chunks of at most
/// [`MAX_MESSAGE_LENGTH`] characters; every chunk of a long line except the
/// last is suffixed with [`MORE_MARKER`]. Empty lines are dropped.
pub fn split_message(message: &str) -> Vec<String> {
    let mut chunks = Vec::new();

    for line in message.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut pieces = chars.chunks(MAX_MESSAGE_LENGTH).peekable();
        while let Some(piece) = pieces.next() {
            let mut chunk: String = piece.iter().collect();
            if pieces.peek().is_some() {
                chunk.push_str(MORE_MARKER);
            }
            chunks.push(chunk);
        }
    }

    chunks
}

/// Strips CR and LF so text can be embedded in a single line.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

// ─── Command builders ───────────────────────────────────────────────────────

/// `PRIVMSG target :text`
pub fn privmsg(target: &str, text: &str) -> String {
    format!("PRIVMSG {target} :{text}")
}

/// `NOTICE target :text`
pub fn notice(target: &str, text: &str) -> String {
    format!("NOTICE {target} :{text}")
}

/// CTCP `ACTION`, i.e. `/me`.
pub fn action(target: &str, text: &str) -> String {
    format!("PRIVMSG {target} :\u{1}ACTION {text}\u{1}")
}

/// CTCP reply, sent as a `NOTICE`: `NOTICE target :\x01COMMAND payload\x01`.
pub fn ctcp_reply(target: &str, command: &str, payload: &str) -> String {
    if payload.is_empty() {
        format!("NOTICE {target} :\u{1}{command}\u{1}")
    } else {
        format!("NOTICE {target} :\u{1}{command} {payload}\u{1}")
    }
}

/// `PING payload`
pub fn ping(payload: &str) -> String {
    format!("PING {payload}")
}

/// `PONG :payload`
pub fn pong(payload: &str) -> String {
    format!("PONG :{payload}")
}

/// `PART channel :reason`
pub fn part(channel: &str, reason: &str) -> String {
    format!("PART {channel} :{reason}")
}

/// `KICK channel user :reason`
pub fn kick(channel: &str, user: &str, reason: &str) -> String {
    format!("KICK {channel} {user} :{reason}")
}

/// `JOIN channel`
pub fn join(channel: &str) -> String {
    format!("JOIN {channel}")
}

/// `NICK nick`
pub fn nick(nick: &str) -> String {
    format!("NICK {nick}")
}

/// `USER user 0 * :real name`
pub fn user(user_name: &str, real_name: &str) -> String {
    format!("USER {user_name} 0 * :{real_name}")
}

/// `PASS password`
pub fn pass(password: &str) -> String {
    format!("PASS {password}")
}

/// `QUIT :message`
pub fn quit(message: &str) -> String {
    format!("QUIT :{message}")
}

/// Returns a copy of `line` that is safe to log.
///
/// `PASS` arguments and anything sent privately to a NickServ-like service
/// are replaced with `<redacted>`.
pub fn redact(line: &str) -> String {
    let upper = line.to_ascii_uppercase();
    if upper.starts_with("PASS ") {
        return "PASS <redacted>".to_string();
    }
    if upper.starts_with("PRIVMSG ") && (upper.contains("IDENTIFY") || upper.contains("SERV ")) {
        if let Some((head, _)) = line.split_once(" :") {
            return format!("{head} :<redacted>");
        }
    }
    line.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_one_chunk() {
        assert_eq!(split_message("hello"), vec!["hello"]);
    }

    #[test]
    fn long_line_is_split_with_more_marker() {
        let text = "a".repeat(MAX_MESSAGE_LENGTH * 2 + 10);
        let chunks = split_message(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], format!("{}{MORE_MARKER}", "a".repeat(MAX_MESSAGE_LENGTH)));
        assert_eq!(chunks[1], format!("{}{MORE_MARKER}", "a".repeat(MAX_MESSAGE_LENGTH)));
        assert_eq!(chunks[2], "a".repeat(10));
    }

    #[test]
    fn exact_length_is_not_marked() {
        let text = "b".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(split_message(&text), vec![text]);
    }

    #[test]
    fn multi_line_message_skips_blank_lines() {
        assert_eq!(split_message("one\r\n\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn split_respects_char_boundaries() {
        let text = "é".repeat(MAX_MESSAGE_LENGTH + 1);
        let chunks = split_message(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "é");
    }

    #[test]
    fn builders_match_wire_format() {
        assert_eq!(user("bot", "Chaskis Bot"), "USER bot 0 * :Chaskis Bot");
        assert_eq!(pong("irc.example.net"), "PONG :irc.example.net");
        assert_eq!(kick("#c", "bob", "bye"), "KICK #c bob :bye");
        assert_eq!(action("#c", "waves"), "PRIVMSG #c :\u{1}ACTION waves\u{1}");
    }

    #[test]
    fn redact_hides_secrets() {
        assert_eq!(redact("PASS hunter2"), "PASS <redacted>");
        assert_eq!(
            redact("PRIVMSG NickServ :IDENTIFY hunter2"),
            "PRIVMSG NickServ :<redacted>"
        );
        assert_eq!(redact("PRIVMSG #room :hello"), "PRIVMSG #room :hello");
    }
}
