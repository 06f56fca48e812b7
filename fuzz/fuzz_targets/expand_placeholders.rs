#![no_main]

use arbitrary::Arbitrary;
use cms_db::escape::expand_placeholders;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    template: String,
    args: Vec<String>,
}

fuzz_target!(|input: Input| {
    let placeholders = input.template.matches('?').count();
    match expand_placeholders(&input.template, &input.args) {
        Ok(expanded) => {
            assert_eq!(placeholders, input.args.len());
            // Every argument is wrapped in a pair of quotes, and embedded
            // quotes are doubled, so quotes added by expansion are even.
            let added = expanded.matches('\'').count() - input.template.matches('\'').count();
            assert_eq!(added % 2, 0);
        }
        Err(_) => assert_ne!(placeholders, input.args.len()),
    }
});
