use std::net::{IpAddr, Ipv4Addr};
use crossbeam_channel::{bounded, Receiver};
use crate::notify::Event;
use crate::proto::Request;
use crate::proto::dns::{Kind as Rr, Record, Value};
use super::{Edge, Graph, Kind, Node};

fn graph(capacity: usize) -> (Graph, Receiver<Event>) {
    let (tx, rx) = bounded(capacity);
    (Graph::new(tx, vec!["lab".to_owned(), "east".to_owned()]), rx)
}

fn events(rx: &Receiver<Event>) -> (Vec<Node>, Vec<Edge>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for event in rx.try_iter() {
        match event {
            Event::Node(node) => nodes.push(node),
            Event::Edge(edge) => edges.push(edge),
            Event::Flow(_)    => (),
        }
    }
    (nodes, edges)
}

fn request(host: &str, url: &str) -> Request {
    Request {
        method: "GET".to_owned(),
        path:   "/".to_owned(),
        host:   Some(host.to_owned()),
        url:    Some(url.to_owned()),
    }
}

#[test]
fn nodes_deduplicated() {
    let (graph, rx) = graph(16);

    let node = graph.node(Kind::Hostname, "example.com".to_owned());
    assert!(graph.add_node(&node));
    assert!(!graph.add_node(&node));

    let (nodes, _) = events(&rx);
    assert_eq!(vec![node], nodes);
    assert_eq!(1, graph.nodes());
}

#[test]
fn nodes_carry_tags() {
    let (graph, _) = graph(16);
    let node = graph.node(Kind::Ip, "10.0.0.1".to_owned());
    assert_eq!(vec!["east", "lab"], node.tags.iter().collect::<Vec<_>>());
}

#[test]
fn edges_add_endpoints() {
    let (graph, rx) = graph(16);

    let a = graph.node(Kind::Hostname, "a.test".to_owned());
    let b = graph.node(Kind::Ip, "10.0.0.1".to_owned());

    assert!(graph.add_edge(&a, &b, "A"));
    assert!(!graph.add_edge(&a, &b, "A"));
    assert!(graph.add_edge(&a, &b, "reverse"));

    let (nodes, edges) = events(&rx);
    assert_eq!(2, nodes.len());
    assert_eq!(2, edges.len());
    assert_eq!("A", edges[0].label);
    assert_eq!(a, edges[0].src);
    assert_eq!(b, edges[0].dst);
}

#[test]
fn address_seen_once() {
    let (graph, rx) = graph(16);
    let addr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

    graph.addr(addr);
    graph.addr(addr);

    let (nodes, _) = events(&rx);
    assert_eq!(1, nodes.len());
    assert_eq!(Kind::Ip, nodes[0].kind);
    assert_eq!("192.0.2.1", nodes[0].value);
}

#[test]
fn dns_record_edges() {
    let (graph, rx) = graph(64);

    graph.dns(&[
        Record {
            kind:  Rr::CNAME,
            name:  "www.a.test".to_owned(),
            value: Value::Name("cdn.a.test".to_owned()),
        },
        Record {
            kind:  Rr::A,
            name:  "cdn.a.test".to_owned(),
            value: Value::Addr(Ipv4Addr::new(203, 0, 113, 9)),
        },
        Record {
            kind:  Rr::MX,
            name:  "a.test".to_owned(),
            value: Value::Name("mail.a.test".to_owned()),
        },
    ]);

    let (nodes, edges) = events(&rx);
    assert_eq!(5, nodes.len());

    let edges = edges.iter().map(|e| {
        (e.src.value.as_str(), e.label.as_str(), e.dst.value.as_str(), e.dst.kind)
    }).collect::<Vec<_>>();

    assert_eq!(vec![
        ("www.a.test", "CNAME", "cdn.a.test",  Kind::Hostname),
        ("cdn.a.test", "A",     "203.0.113.9", Kind::Ip),
        ("a.test",     "MX",    "mail.a.test", Kind::Hostname),
    ], edges);
}

#[test]
fn http_host_edge() {
    let (graph, rx) = graph(16);

    graph.http(&request("a.test:8443", "https://a.test:8443/"));
    graph.http(&request("[2001:db8::1]", "http://[2001:db8::1]/"));

    let (_, edges) = events(&rx);
    assert_eq!(2, edges.len());
    assert_eq!("a.test", edges[0].dst.value);
    assert_eq!("host", edges[0].label);
    assert_eq!(Kind::Url, edges[0].src.kind);
    assert_eq!("[2001:db8::1]", edges[1].dst.value);
}

#[test]
fn http_without_url() {
    let (graph, rx) = graph(16);

    let mut req = request("a.test", "");
    req.url = None;
    graph.http(&req);

    assert!(rx.try_iter().next().is_none());
    assert_eq!(0, graph.edges());
}

#[test]
fn full_channel_counts_drops() {
    let (graph, rx) = graph(1);

    graph.add_node(&graph.node(Kind::Ip, "10.0.0.1".to_owned()));
    graph.add_node(&graph.node(Kind::Ip, "10.0.0.2".to_owned()));
    graph.add_node(&graph.node(Kind::Ip, "10.0.0.3".to_owned()));

    assert_eq!(1, rx.try_iter().count());
    assert_eq!(2, graph.dropped());
    assert_eq!(1, graph.nodes());

    assert!(graph.add_node(&graph.node(Kind::Ip, "10.0.0.2".to_owned())));
    assert_eq!(2, graph.nodes());
}

#[test]
fn full_channel_edge_retried() {
    let (graph, rx) = graph(2);

    let src = graph.node(Kind::Url, "http://a.test/".to_owned());
    let dst = graph.node(Kind::Hostname, "a.test".to_owned());

    assert!(!graph.add_edge(&src, &dst, "host"));
    assert_eq!(0, graph.edges());

    let (nodes, edges) = events(&rx);
    assert_eq!(2, nodes.len());
    assert!(edges.is_empty());

    assert!(graph.add_edge(&src, &dst, "host"));
    assert_eq!(1, graph.edges());
    assert_eq!(1, graph.dropped());
}

#[test]
fn closed_channel_ignored() {
    let (graph, rx) = graph(1);
    drop(rx);

    assert!(graph.add_node(&graph.node(Kind::Url, "http://a.test/".to_owned())));
    assert_eq!(0, graph.dropped());
}
