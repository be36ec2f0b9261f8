use crate::cli::actions::Action;
use anyhow::Result;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let min_codes = matches.get_one::<u8>("min-codes").copied().unwrap_or(1);
    let max_codes = matches.get_one::<u8>("max-codes").copied().unwrap_or(10);

    if min_codes == 0 || min_codes > max_codes {
        return Err(anyhow::anyhow!(
            "invalid code count bounds: --min-codes {min_codes} --max-codes {max_codes}"
        ));
    }

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches.get_one::<String>("dsn").cloned(),
        cooldown_seconds: matches.get_one::<u64>("cooldown").copied().unwrap_or(300),
        min_codes,
        max_codes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    fn action_from(args: Vec<&str>) -> Result<Action> {
        let matches = commands::new().get_matches_from(args);
        handler(&matches)
    }

    #[test]
    fn defaults_to_in_memory_store() {
        temp_env::with_vars(
            [
                ("GARDI_PORT", None::<String>),
                ("GARDI_DSN", None),
                ("GARDI_COOLDOWN", None),
                ("GARDI_MIN_CODES", None),
                ("GARDI_MAX_CODES", None),
            ],
            || {
                let Ok(Action::Server {
                    port,
                    dsn,
                    cooldown_seconds,
                    min_codes,
                    max_codes,
                }) = action_from(vec!["gardi"])
                else {
                    panic!("expected a server action");
                };
                assert_eq!(port, 8080);
                assert_eq!(dsn, None);
                assert_eq!(cooldown_seconds, 300);
                assert_eq!(min_codes, 1);
                assert_eq!(max_codes, 10);
            },
        );
    }

    #[test]
    fn carries_dsn_and_policy_overrides() {
        let Ok(Action::Server {
            dsn,
            cooldown_seconds,
            min_codes,
            max_codes,
            ..
        }) = action_from(vec![
            "gardi",
            "--dsn",
            "postgres://localhost/gardi",
            "--cooldown",
            "60",
            "--min-codes",
            "10",
            "--max-codes",
            "10",
        ])
        else {
            panic!("expected a server action");
        };
        assert_eq!(dsn.as_deref(), Some("postgres://localhost/gardi"));
        assert_eq!(cooldown_seconds, 60);
        assert_eq!(min_codes, 10);
        assert_eq!(max_codes, 10);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let result = action_from(vec!["gardi", "--min-codes", "5", "--max-codes", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_minimum() {
        let result = action_from(vec!["gardi", "--min-codes", "0"]);
        assert!(result.is_err());
    }
}
