use std::borrow::Cow;
use std::path::Path;

use combine::EasyParser;

use crate::prelude::*;

fn ignore_case(l: char, r: char) -> bool {
    l.eq_ignore_ascii_case(&r)
}

p! {
    inline_space() -> char, {
        satisfy(|c: char| c.is_whitespace() && c != '\n')
    }
}

p! {
    bare_word() -> &'a str, {
        recognize(skip_many1(satisfy(|c: char| !c.is_whitespace())))
    }
}

p! {
    quoted_word(quote: char) -> &'a str, {
        // arguments arrive as `&mut char`
        let quote = *quote;
        char(quote)
            .with(recognize(skip_many(satisfy(move |c: char| c != quote && c != '\n'))))
            .skip(char(quote))
    }
}

// everything up to and including the whitespace after `$DATA`:
p! {
    data_keyword() -> &'a str, {
        recognize((
            skip_many(inline_space()),
            char('$'),
            string_cmp("DATA", ignore_case),
            skip_many1(inline_space()),
        ))
    }
}

p! {
    data_path() -> (Option<char>, &'a str), {
        choice((
            quoted_word('"').map(|path| (Some('"'), path)),
            quoted_word('\'').map(|path| (Some('\''), path)),
            bare_word().map(|path| (None, path)),
        ))
    }
}

p! {
    data_record() -> (&'a str, (Option<char>, &'a str), &'a str), {
        (data_keyword(), data_path(), recognize(skip_many(any())))
    }
}

p! {
    file_option() -> &'a str, {
        string_cmp("FILE", ignore_case)
            .with(skip_many(inline_space()))
            .with(char('='))
            .with(skip_many(inline_space()))
            .with(bare_word())
    }
}

/// If `line` is a `$DATA` record with a relative path, return it with the path
/// one directory level further up (`data.csv` becomes `../data.csv`).
/// Any other line is returned as-is.
pub fn add_path_level_to_data(line: &str) -> Cow<'_, str> {
    match data_record().easy_parse(line) {
        Ok(((keyword, (quote, path), rest), _))
            if !path.is_empty() && !Path::new(path).is_absolute() =>
        {
            let mut rewritten = String::with_capacity(line.len() + 3);
            rewritten.push_str(keyword);
            if let Some(q) = quote {
                rewritten.push(q);
            }
            rewritten.push_str("../");
            rewritten.push_str(path);
            if let Some(q) = quote {
                rewritten.push(q);
            }
            rewritten.push_str(rest);
            Cow::Owned(rewritten)
        }
        _ => Cow::Borrowed(line),
    }
}

/// Collect the `FILE=` names declared by every `$TABLE` record, in file order.
/// A record runs until the next line that starts a new `$` record.
pub fn find_output_files<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut files = Vec::new();
    let mut in_table = false;

    for line in lines {
        let line = strip_comment(line.as_ref());
        if let Some(record) = line.trim_start().strip_prefix('$') {
            in_table = is_table_record(record);
        }
        if in_table {
            collect_file_options(line, &mut files);
        }
    }

    files
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

// NONMEM accepts record names abbreviated to three letters.
fn is_table_record(record: &str) -> bool {
    let name: String = record
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    name.len() >= 3 && "TABLE".starts_with(&name)
}

fn collect_file_options(line: &str, files: &mut Vec<String>) {
    let mut prev_is_boundary = true;
    for (idx, c) in line.char_indices() {
        if prev_is_boundary && (c == 'F' || c == 'f') {
            if let Ok((name, _)) = file_option().easy_parse(&line[idx..]) {
                files.push(name.to_owned());
            }
        }
        prev_is_boundary = c.is_whitespace();
    }
}
