use super::petri_net_struct::{PetriNet, Place, PlaceKind, Transition, TransitionKind};
use crate::error::ParseError;
use quick_xml::{events::BytesStart, Reader};
use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader},
};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    None,
    Pnml,
    Net,
    NetName,
    Place,
    PlaceName,
    InitialMarking,
    PlaceFinalMarking,
    PlaceType,
    Transition,
    TransitionName,
    TransitionOrigName,
    TransitionType,
    FinalMarkings,
    FinalMarkingsMarking,
    FinalMarkingMarkingPlace,
    Arc,
    ArcInscription,
}

fn get_attribute(b: &BytesStart<'_>, key: &str) -> Option<String> {
    let attr = b.try_get_attribute(key).ok().flatten()?;
    Some(
        attr.unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(attr.value.as_ref()).into_owned()),
    )
}

fn parse_token_count(place: &str, text: &str) -> Result<u64, ParseError> {
    text.trim()
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidTokenCount {
            place: place.to_string(),
            value: text.to_string(),
        })
}

/// Arc as read from the file, resolved once all nodes are known
struct RawArc {
    id: String,
    source: String,
    target: String,
    weight: Option<String>,
}

///
/// Import a PNML file from the given XML reader ([`quick_xml::Reader`])
///
/// Also consider using [`PetriNet::load_from_path`] for importing an accepting net from a filepath directly.
///
/// The following PNML features are read:
///
/// - Places (with initial marking, and the `finalMarking`/`type` annotations written by this crate)
/// - Transitions (with the `origname`/`type` annotations written by this crate)
/// - Silent transitions (`toolspecific` tag with `activity="$invisible$"`)
/// - Unit arcs (an inscription other than 1 is rejected)
/// - The first final marking of the `finalmarkings` section (further ones are ignored)
///
/// This function does _not_ require the net to have a final marking; [`PetriNet::load`] does.
pub fn import_pnml<T>(reader: &mut Reader<T>) -> Result<PetriNet, ParseError>
where
    T: BufRead,
{
    reader.config_mut().trim_text(true);
    reader.config_mut().expand_empty_elements = true;
    let mut buf: Vec<u8> = Vec::new();

    let mut current_mode: Mode = Mode::None;
    let mut encountered_pnml_tag = false;
    let mut pn = PetriNet::new();
    let mut arcs: Vec<RawArc> = Vec::new();
    let mut final_marking_count = 0;
    let mut final_marking_place: Option<String> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            quick_xml::events::Event::Start(b) => match b.name().as_ref() {
                b"pnml" => {
                    current_mode = Mode::Pnml;
                    encountered_pnml_tag = true;
                }
                b"net" => {
                    if current_mode != Mode::Pnml {
                        warn!("Expected to be in Mode::Pnml when encountering net");
                    }
                    pn.id = get_attribute(&b, "id").unwrap_or_default();
                    current_mode = Mode::Net;
                }
                b"page" => {
                    current_mode = Mode::Net;
                }
                b"place" => {
                    if current_mode == Mode::FinalMarkingsMarking {
                        // Save idref and use it when parsing the corresponding <text>1</text>
                        final_marking_place = Some(get_attribute(&b, "idref").ok_or(
                            ParseError::MissingKey {
                                element: "place",
                                key: "idref",
                            },
                        )?);
                        current_mode = Mode::FinalMarkingMarkingPlace;
                    } else {
                        let id = get_attribute(&b, "id").ok_or(ParseError::MissingKey {
                            element: "place",
                            key: "id",
                        })?;
                        pn.places.push(Place {
                            name: id.clone(),
                            id,
                            initial_marking: 0,
                            final_marking: None,
                            kind: PlaceKind::Model,
                        });
                        current_mode = Mode::Place;
                    }
                }
                b"transition" => {
                    let id = get_attribute(&b, "id").ok_or(ParseError::MissingKey {
                        element: "transition",
                        key: "id",
                    })?;
                    pn.transitions.push(Transition {
                        id,
                        name: String::new(),
                        original_name: String::new(),
                        kind: TransitionKind::Model,
                    });
                    current_mode = Mode::Transition;
                }
                b"arc" => {
                    let source = get_attribute(&b, "source").ok_or(ParseError::MissingKey {
                        element: "arc",
                        key: "source",
                    })?;
                    let target = get_attribute(&b, "target").ok_or(ParseError::MissingKey {
                        element: "arc",
                        key: "target",
                    })?;
                    // Arcs are only resolved at the end, since their endpoints may be declared later
                    arcs.push(RawArc {
                        id: get_attribute(&b, "id").unwrap_or_else(|| format!("{source}{target}")),
                        source,
                        target,
                        weight: None,
                    });
                    current_mode = Mode::Arc;
                }
                b"inscription" => {
                    if current_mode == Mode::Arc {
                        current_mode = Mode::ArcInscription;
                    }
                }
                b"toolspecific" => {
                    if current_mode == Mode::Transition
                        && get_attribute(&b, "activity").as_deref() == Some("$invisible$")
                    {
                        if let Some(trans) = pn.transitions.last() {
                            pn.invisible_transitions.insert(trans.id.clone());
                        }
                    }
                }
                b"initialMarking" => {
                    if current_mode == Mode::Place {
                        current_mode = Mode::InitialMarking;
                    }
                }
                b"finalMarking" => {
                    if current_mode == Mode::Place {
                        current_mode = Mode::PlaceFinalMarking;
                    }
                }
                b"type" => match current_mode {
                    Mode::Place => current_mode = Mode::PlaceType,
                    Mode::Transition => current_mode = Mode::TransitionType,
                    _ => {}
                },
                b"origname" => {
                    if current_mode == Mode::Transition {
                        current_mode = Mode::TransitionOrigName;
                    }
                }
                b"finalmarkings" => current_mode = Mode::FinalMarkings,
                b"marking" => {
                    if current_mode == Mode::FinalMarkings {
                        current_mode = Mode::FinalMarkingsMarking;
                        final_marking_count += 1;
                        if final_marking_count == 2 {
                            warn!("PNML contains more than one final marking, only the first one is used");
                        }
                    }
                }
                b"name" => match current_mode {
                    Mode::Net => current_mode = Mode::NetName,
                    Mode::Place => current_mode = Mode::PlaceName,
                    Mode::Transition => current_mode = Mode::TransitionName,
                    _ => {}
                },
                _ => {}
            },
            quick_xml::events::Event::End(b) => match b.name().as_ref() {
                b"place" => {
                    if current_mode == Mode::FinalMarkingMarkingPlace {
                        current_mode = Mode::FinalMarkingsMarking;
                        final_marking_place = None;
                    } else {
                        current_mode = Mode::Net;
                    }
                }
                b"transition" | b"arc" => current_mode = Mode::Net,
                b"initialMarking" | b"finalMarking" => {
                    if matches!(current_mode, Mode::InitialMarking | Mode::PlaceFinalMarking) {
                        current_mode = Mode::Place;
                    }
                }
                b"type" => match current_mode {
                    Mode::PlaceType => current_mode = Mode::Place,
                    Mode::TransitionType => current_mode = Mode::Transition,
                    _ => {}
                },
                b"origname" => {
                    if current_mode == Mode::TransitionOrigName {
                        current_mode = Mode::Transition;
                    }
                }
                b"finalmarkings" => current_mode = Mode::Net,
                b"marking" => {
                    if current_mode == Mode::FinalMarkingsMarking {
                        current_mode = Mode::FinalMarkings;
                    }
                }
                b"inscription" => {
                    if current_mode == Mode::ArcInscription {
                        current_mode = Mode::Arc
                    }
                }
                b"name" => match current_mode {
                    Mode::NetName => current_mode = Mode::Net,
                    Mode::PlaceName => current_mode = Mode::Place,
                    Mode::TransitionName => current_mode = Mode::Transition,
                    _ => {}
                },
                _ => {}
            },
            quick_xml::events::Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                match current_mode {
                    Mode::NetName => pn.name = text,
                    Mode::PlaceName => {
                        if let Some(place) = pn.places.last_mut() {
                            place.name = text;
                        }
                    }
                    Mode::InitialMarking => {
                        if let Some(place) = pn.places.last_mut() {
                            place.initial_marking = parse_token_count(&place.id, &text)?;
                        }
                    }
                    Mode::PlaceFinalMarking => {
                        if let Some(place) = pn.places.last_mut() {
                            place.final_marking = Some(parse_token_count(&place.id, &text)?);
                        }
                    }
                    Mode::PlaceType => {
                        if let Some(place) = pn.places.last_mut() {
                            place.kind = text.trim().parse()?;
                        }
                    }
                    Mode::TransitionName => {
                        if let Some(trans) = pn.transitions.last_mut() {
                            trans.name = text;
                        }
                    }
                    Mode::TransitionOrigName => {
                        if let Some(trans) = pn.transitions.last_mut() {
                            trans.original_name = text;
                        }
                    }
                    Mode::TransitionType => {
                        if let Some(trans) = pn.transitions.last_mut() {
                            trans.kind = text.trim().parse()?;
                        }
                    }
                    Mode::FinalMarkingMarkingPlace => {
                        if final_marking_count == 1 {
                            if let Some(place_id) = &final_marking_place {
                                let count = parse_token_count(place_id, &text)?;
                                pn.final_marking.push((place_id.clone(), count));
                            }
                        }
                    }
                    Mode::ArcInscription => {
                        if let Some(arc) = arcs.last_mut() {
                            arc.weight = Some(text);
                        }
                    }
                    _ => {}
                }
            }
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
    }

    if !encountered_pnml_tag {
        return Err(ParseError::NoPnmlTag);
    }

    for trans in pn.transitions.iter_mut() {
        if trans.original_name.is_empty() {
            trans.original_name = trans.name.clone();
        }
    }

    let place_ids: HashSet<&str> = pn.places.iter().map(|p| p.id.as_str()).collect();
    let transition_ids: HashSet<&str> = pn.transitions.iter().map(|t| t.id.as_str()).collect();
    let mut resolved = Vec::with_capacity(arcs.len());
    for arc in arcs {
        if let Some(weight) = &arc.weight {
            if weight.trim() != "1" {
                return Err(ParseError::UnsupportedArcWeight {
                    arc: arc.id,
                    weight: weight.clone(),
                });
            }
        }
        for node in [&arc.source, &arc.target] {
            if !place_ids.contains(node.as_str()) && !transition_ids.contains(node.as_str()) {
                return Err(ParseError::UnknownArcEndpoint {
                    arc: arc.id.clone(),
                    node: node.clone(),
                });
            }
        }
        let place_to_transition = place_ids.contains(arc.source.as_str())
            && transition_ids.contains(arc.target.as_str());
        let transition_to_place = transition_ids.contains(arc.source.as_str())
            && place_ids.contains(arc.target.as_str());
        if !place_to_transition && !transition_to_place {
            return Err(ParseError::InvalidArc(arc.id));
        }
        resolved.push(super::petri_net_struct::Arc {
            id: arc.id,
            source: arc.source,
            target: arc.target,
        });
    }
    pn.arcs = resolved;

    for (place_id, count) in &pn.final_marking {
        match pn.places.iter_mut().find(|p| &p.id == place_id) {
            Some(place) => place.final_marking = Some(*count),
            None => return Err(ParseError::UnknownFinalPlace(place_id.clone())),
        }
    }

    Ok(pn)
}

///
/// Import a PNML file from the given standard buffered reader (implementing [`std::io::BufRead`])
///
/// Also see [`import_pnml`] for an alternative version of this function, which takes a XML specific reader [`quick_xml::Reader`] instead
pub fn import_pnml_reader<T>(std_reader: &mut T) -> Result<PetriNet, ParseError>
where
    T: BufRead,
{
    let mut xml_reader = Reader::from_reader(std_reader);
    import_pnml(&mut xml_reader)
}

/// Import a PNML file from a byte slice
pub fn import_pnml_slice(bytes: &[u8]) -> Result<PetriNet, ParseError> {
    let mut reader = BufReader::new(bytes);
    import_pnml_reader(&mut reader)
}

///  Import a PNML file from the given filepath
///
/// Also consider using [`PetriNet::load_from_path`], which additionally requires a final marking.
pub fn import_pnml_from_path<P: AsRef<std::path::Path>>(path: P) -> crate::Result<PetriNet> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    Ok(import_pnml_reader(&mut reader)?)
}

#[cfg(test)]
mod test {
    use super::*;

    const NET: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<pnml>
  <net id="net1" type="http://www.pnml.org/version-2009/grammar/pnmlcoremodel">
    <name><text>example</text></name>
    <page id="n0">
      <place id="p0">
        <name><text>source</text></name>
        <initialMarking><text>1</text></initialMarking>
      </place>
      <place id="p1"><name><text>sink</text></name></place>
      <transition id="t0"><name><text>a &amp; b</text></name></transition>
      <transition id="t1">
        <name><text>skip</text></name>
        <toolspecific tool="ProM" version="6.4" activity="$invisible$" localNodeID="x"/>
      </transition>
      <arc id="a0" source="p0" target="t0"/>
      <arc id="a1" source="t0" target="p1"><inscription><text>1</text></inscription></arc>
      <arc id="a2" source="p0" target="t1"/>
      <arc id="a3" source="t1" target="p1"/>
    </page>
    <finalmarkings>
      <marking>
        <place idref="p1"><text>1</text></place>
      </marking>
    </finalmarkings>
  </net>
</pnml>"#;

    #[test]
    fn test_pnml_import() {
        let pn = PetriNet::load(NET.as_bytes()).unwrap();
        assert_eq!(pn.id, "net1");
        assert_eq!(pn.name, "example");
        assert_eq!(pn.places.len(), 2);
        assert_eq!(pn.transitions.len(), 2);
        assert_eq!(pn.arcs.len(), 4);
        assert_eq!(pn.places[0].name, "source");
        assert_eq!(pn.places[0].initial_marking, 1);
        // missing initial marking defaults to 0
        assert_eq!(pn.places[1].initial_marking, 0);
        assert_eq!(pn.places[1].final_marking, Some(1));
        assert_eq!(pn.final_marking, vec![("p1".to_string(), 1)]);
        assert_eq!(pn.transitions[0].name, "a & b");
        assert_eq!(pn.transitions[0].original_name, "a & b");
        assert!(pn.invisible_transitions.contains("t1"));
    }

    #[test]
    fn test_missing_final_marking() {
        let without_final = NET.replace(
            r#"<place idref="p1"><text>1</text></place>"#,
            "",
        );
        let pn = import_pnml_slice(without_final.as_bytes()).unwrap();
        assert!(pn.final_marking.is_empty());
        assert!(matches!(
            PetriNet::load(without_final.as_bytes()),
            Err(ParseError::MissingFinalMarking)
        ));
    }

    #[test]
    fn test_unknown_arc_endpoint() {
        let broken = NET.replace(r#"target="t0"/>"#, r#"target="t9"/>"#);
        assert!(matches!(
            import_pnml_slice(broken.as_bytes()),
            Err(ParseError::UnknownArcEndpoint { node, .. }) if node == "t9"
        ));
    }

    #[test]
    fn test_place_to_place_arc() {
        let broken = NET.replace(
            r#"<arc id="a0" source="p0" target="t0"/>"#,
            r#"<arc id="a0" source="p0" target="p1"/>"#,
        );
        assert!(matches!(
            import_pnml_slice(broken.as_bytes()),
            Err(ParseError::InvalidArc(id)) if id == "a0"
        ));
    }

    #[test]
    fn test_weighted_arc_rejected() {
        let weighted = NET.replace(
            "<inscription><text>1</text></inscription>",
            "<inscription><text>3</text></inscription>",
        );
        assert!(matches!(
            import_pnml_slice(weighted.as_bytes()),
            Err(ParseError::UnsupportedArcWeight { .. })
        ));
    }

    #[test]
    fn test_invalid_token_count() {
        let broken = NET.replace(
            "<initialMarking><text>1</text>",
            "<initialMarking><text>one</text>",
        );
        assert!(matches!(
            import_pnml_slice(broken.as_bytes()),
            Err(ParseError::InvalidTokenCount { place, .. }) if place == "p0"
        ));
    }

    #[test]
    fn test_invalid_pnml_import() {
        let pn_res = import_pnml_slice(b"<log><trace/></log>");
        assert!(matches!(pn_res, Err(ParseError::NoPnmlTag)));
    }
}
