//! Operator commands for the blocked-word and substitution lists.

use tracing::{error, info};

use crate::rules::RuleStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    AddWord(String),
    DelWord(String),
    ListWords,
    AddReplace { source: String, target: String },
    DelReplace(String),
    ListReplace,
    /// Known command with missing arguments; carries the usage line.
    Usage(&'static str),
}

impl AdminCommand {
    /// Parses `/command args...`, tolerating a `@botname` suffix. Returns
    /// `None` for anything that is not one of the admin commands.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head);
        let words: Vec<&str> = args.split_whitespace().collect();
        let joined = words.join(" ");

        let command = match name {
            "addword" if words.is_empty() => AdminCommand::Usage("usage: /addword [word]"),
            "addword" => AdminCommand::AddWord(joined),
            "delword" if words.is_empty() => AdminCommand::Usage("usage: /delword [word]"),
            "delword" => AdminCommand::DelWord(joined),
            "listwords" => AdminCommand::ListWords,
            "addreplace" if words.len() < 2 => {
                AdminCommand::Usage("usage: /addreplace [source] [target]")
            }
            "addreplace" => AdminCommand::AddReplace {
                source: words[0].to_string(),
                target: words[1..].join(" "),
            },
            "delreplace" if words.is_empty() => AdminCommand::Usage("usage: /delreplace [source]"),
            "delreplace" => AdminCommand::DelReplace(words[0].to_string()),
            "listreplace" => AdminCommand::ListReplace,
            _ => return None,
        };
        Some(command)
    }

    /// Applies the command to `store` and returns the reply text.
    pub fn execute(&self, store: &dyn RuleStore) -> String {
        match self.apply(store) {
            Ok(reply) => reply,
            Err(e) => {
                error!(command = ?self, error = %e, "Admin command failed");
                "שגיאה בעדכון הרשימה.".to_string()
            }
        }
    }

    fn apply(&self, store: &dyn RuleStore) -> Result<String, crate::error::RuleStoreError> {
        let reply = match self {
            AdminCommand::Usage(usage) => usage.to_string(),
            AdminCommand::AddWord(word) => {
                if store.add_word(word)? {
                    info!(%word, "Blacklist word added");
                    format!("המילה '{word}' נוספה לרשימה השחורה.")
                } else {
                    "המילה כבר קיימת ברשימה.".to_string()
                }
            }
            AdminCommand::DelWord(word) => {
                if store.remove_word(word)? {
                    info!(%word, "Blacklist word removed");
                    format!("המילה '{word}' הוסרה מהרשימה.")
                } else {
                    "המילה לא נמצאה ברשימה.".to_string()
                }
            }
            AdminCommand::ListWords => {
                let words = store.load_blacklist()?;
                if words.is_empty() {
                    "הרשימה ריקה.".to_string()
                } else {
                    format!("מילים חסומות:\n{}", words.join(", "))
                }
            }
            AdminCommand::AddReplace { source, target } => {
                store.set_replacement(source, target)?;
                info!(%source, %target, "Replacement set");
                format!("הוגדרה החלפה: '{source}' -> '{target}'")
            }
            AdminCommand::DelReplace(source) => {
                if store.remove_replacement(source)? {
                    info!(%source, "Replacement removed");
                    format!("ההחלפה עבור '{source}' נמחקה.")
                } else {
                    format!("לא נמצאה החלפה עבור '{source}'.")
                }
            }
            AdminCommand::ListReplace => {
                let rules = store.load_replacements()?;
                if rules.is_empty() {
                    "רשימת ההחלפות ריקה.".to_string()
                } else {
                    let mut reply = String::from("רשימת החלפות:\n");
                    for (source, target) in &rules {
                        reply.push_str(&format!("{source} -> {target}\n"));
                    }
                    reply
                }
            }
        };
        Ok(reply)
    }
}
