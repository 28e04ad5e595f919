use std::env;

use wordminer_morph::{lemmatize_with_rule, tokenize};

fn main() {
    let text: Vec<String> = env::args().skip(1).collect();
    let text = if text.is_empty() {
        "The cats are running and the dogs ran. Studies show boxes stopped.".to_string()
    } else {
        text.join(" ")
    };

    println!("Text: {text}\n");
    for token in tokenize(&text) {
        let (lemma, rule) = lemmatize_with_rule(token.text);
        println!(
            "  {:>3}..{:<3} {:<12} -> {:<10} [{:?}]",
            token.start, token.end, token.text, lemma, rule
        );
    }
}
