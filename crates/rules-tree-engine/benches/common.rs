// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_rules_text(top_level: usize) -> String {
    let mut text = String::from("Tournament Rules\nLast updated: 2026\n");
    for hundred in 1..=top_level {
        let base = hundred * 100;
        text.push_str(&format!("{base}. Chapter {hundred}\n"));
        for rule in 1..=20 {
            text.push_str(&format!(
                "{}. Rule {rule}: Players must follow the procedure described here.\n",
                base + rule
            ));
            for sub in 1..=4 {
                text.push_str(&format!(
                    "{}.{sub}. Detail {sub} of rule {rule}, see rule {}.1. for the\n",
                    base + rule,
                    base + 1
                ));
                text.push_str("exceptions that apply during playoff rounds.\n");
                text.push_str(&format!("{}.{sub}.a. First case", base + rule));
                text.push_str(&format!(" {}.{sub}.b. Second case\n", base + rule));
            }
        }
    }
    text
}
