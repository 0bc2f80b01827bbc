use combine::EasyParser;

use crate::prelude::*;
use crate::Error;

/// Longest range a single sequence argument may expand to.
pub const MAX_SEQUENCE_LEN: u64 = 100_000;

p! {
    digits() -> &'a str, {
        recognize(skip_many1(digit()))
    }
}

p! {
    name_sequence() -> (&'a str, (&'a str, &'a str), &'a str), {
        (
            recognize(skip_many(none_of("[".chars()))),
            char('[')
                .with(digits())
                .skip(char(':'))
                .and(digits())
                .skip(char(']')),
            recognize(skip_many(any())),
        )
    }
}

/// True if `pattern` looks like `prefix[START:END]suffix`.
pub fn is_name_sequence(pattern: &str) -> bool {
    name_sequence().easy_parse(pattern).is_ok()
}

/// Expand `prefix[START:END]suffix` into one name per number in the range,
/// zero-padded to the width of `START`.
pub fn expand_name_sequence(pattern: &str) -> Result<Vec<String>, Error> {
    let invalid = |msg: String| Error::InvalidSequence {
        pattern: pattern.to_owned(),
        msg,
    };

    let ((prefix, (start_str, end_str), suffix), _) = name_sequence()
        .easy_parse(pattern)
        .map_err(|e| invalid(e.to_string()))?;

    let start: u64 = start_str.parse().map_err(|e| invalid(format!("{e}")))?;
    let end: u64 = end_str.parse().map_err(|e| invalid(format!("{e}")))?;
    if end < start {
        return Err(Error::DescendingSequence(pattern.to_owned()));
    }
    if end - start >= MAX_SEQUENCE_LEN {
        return Err(invalid(format!(
            "range covers {} names; at most {MAX_SEQUENCE_LEN} are allowed",
            u128::from(end - start) + 1
        )));
    }

    let width = start_str.len();
    Ok((start..=end)
        .map(|n| format!("{prefix}{n:0width$}{suffix}"))
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_expand() -> Result<()> {
        assert_eq!(
            vec!["run001.mod", "run002.mod", "run003.mod"],
            expand_name_sequence("run[001:003].mod")?
        );
        assert_eq!(
            vec!["models/9.ctl", "models/10.ctl"],
            expand_name_sequence("models/[9:10].ctl")?
        );
        assert_eq!(vec!["run5.mod"], expand_name_sequence("run[5:5].mod")?);
        Ok(())
    }

    #[test]
    fn test_invalid_sequences() {
        assert!(!is_name_sequence("run001.mod"));
        assert!(!is_name_sequence("run[a:b].mod"));
        assert!(is_name_sequence("run[1:2].mod"));
        assert!(matches!(
            expand_name_sequence("run[1-2].mod"),
            Err(Error::InvalidSequence { .. })
        ));
        assert!(matches!(
            expand_name_sequence("run[3:1].mod"),
            Err(Error::DescendingSequence(_))
        ));
    }

    #[test]
    fn test_oversized_sequence() -> Result<()> {
        let err = expand_name_sequence("run[0:99999999999].mod").unwrap_err();
        assert!(matches!(err, Error::InvalidSequence { .. }));
        assert!(err.to_string().contains("at most"), "{err}");
        assert!(matches!(
            expand_name_sequence("run[0:18446744073709551615].mod"),
            Err(Error::InvalidSequence { .. })
        ));

        let names = expand_name_sequence("run[1:100000].mod")?;
        assert_eq!(100_000, names.len());
        assert_eq!("run100000.mod", names[names.len() - 1]);
        Ok(())
    }
}
