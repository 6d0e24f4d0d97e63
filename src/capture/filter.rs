use std::net::IpAddr;
use pnet::datalink;

#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub local:   bool,
}

impl Filter {
    pub fn expression(&self) -> String {
        let locals = match self.local {
            true  => local_addrs(),
            false => Vec::new(),
        };
        self.build(&locals)
    }

    pub fn build(&self, locals: &[IpAddr]) -> String {
        let mut terms = Vec::new();

        if !self.include.is_empty() {
            terms.push(group(&self.include, " or "));
        }

        if !self.exclude.is_empty() {
            terms.push(format!("not {}", group(&self.exclude, " or ")));
        }

        terms.push("not net 127.0.0.0/8".to_owned());

        for addr in locals.iter().filter(|a| !a.is_loopback()) {
            terms.push(format!("not host {}", addr));
        }

        terms.join(" and ")
    }
}

fn group(exprs: &[String], sep: &str) -> String {
    let exprs = exprs.iter().map(|e| format!("({})", e)).collect::<Vec<_>>();
    format!("({})", exprs.join(sep))
}

fn local_addrs() -> Vec<IpAddr> {
    datalink::interfaces().into_iter().flat_map(|link| {
        link.ips.into_iter().map(|net| net.ip())
    }).filter(IpAddr::is_ipv4).collect()
}
