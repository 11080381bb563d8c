//! Result rendering.

use otter_core::{Result, ResultMap, StateResult};

/// `host name kind state consistent message`
pub fn line(result: &StateResult) -> String {
    let md = &result.metadata;
    format!(
        "{} {} {} {} {} {}",
        result.host, md.name, md.kind, md.desired_state, result.consistent, result.message
    )
}

/// Render every result, one per line or as a JSON document.
pub fn results(results: &ResultMap, json: bool) -> Result<String> {
    if json {
        return results.to_json();
    }
    Ok(results.iter().map(line).collect::<Vec<_>>().join("\n"))
}

/// Render a host list.
pub fn hosts(hosts: &[String], json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string(hosts)?);
    }
    Ok(hosts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_core::Metadata;

    #[test]
    fn one_line_per_result() {
        let mut map = ResultMap::new("web-1");
        map.add(StateResult::consistent(
            Metadata::new("nginx", "package", "installed"),
            "Success",
        ));
        map.add(StateResult::faulted("web-2", "Timeout after 10000ms waiting on /result/x"));

        let text = results(&map, false).unwrap();
        assert_eq!(
            text,
            "web-1 nginx package installed true Success\n\
             web-2 Faulted Faulted Faulted false Timeout after 10000ms waiting on /result/x"
        );
    }

    #[test]
    fn json_groups_by_host() {
        let mut map = ResultMap::new("web-1");
        map.add(StateResult::faulted("web-1", "No state loaded for host"));
        let value: serde_json::Value = serde_json::from_str(&results(&map, true).unwrap()).unwrap();
        assert_eq!(value["web-1"][0]["consistent"], false);
        assert_eq!(
            hosts(&["a".into(), "b".into()], true).unwrap(),
            "[\"a\",\"b\"]"
        );
    }
}
