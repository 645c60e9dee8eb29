use std::io::Write;

use quick_xml::{
    events::{BytesDecl, BytesText, Event},
    Writer,
};

use crate::utils::output_file::write_file_atomically;

use super::petri_net_struct::PetriNet;
const OK: Result<(), std::io::Error> = Ok(());

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<(), std::io::Error> {
    writer.create_element(tag).write_inner_content(|writer| {
        writer
            .create_element("text")
            .write_text_content(BytesText::new(text))?;
        OK
    })?;
    OK
}

///
/// Export a [`PetriNet`] to the PNML format and write the result to the provided [`std::io::Write`]r
///
/// Besides the standard PNML records, every place carries its `finalMarking` (if any) and `type`,
/// and every transition its `origname` and `type`, so that synchronous products can be imported again without losing information.
///
pub fn export_petri_net_to_pnml<W: Write>(pn: &PetriNet, writer: W) -> Result<(), quick_xml::Error> {
    let mut writer = Writer::new_with_indent(writer, b' ', 2);
    write_petri_net_pnml(pn, &mut writer)
}

///
/// Write a [`PetriNet`] as a complete PNML document to an existing [`quick_xml::Writer`]
///
pub fn write_petri_net_pnml<W: Write>(
    pn: &PetriNet,
    writer: &mut Writer<W>,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let net_id = if pn.id.is_empty() { "net" } else { pn.id.as_str() };
    writer.create_element("pnml").write_inner_content(|writer| {
        writer
            .create_element("net")
            .with_attributes(vec![
                ("id", net_id),
                (
                    "type",
                    "http://www.pnml.org/version-2009/grammar/pnmlcoremodel",
                ),
            ])
            .write_inner_content(|writer| {
                if !pn.name.is_empty() {
                    write_text_element(writer, "name", &pn.name)?;
                }
                writer
                    .create_element("page")
                    .with_attribute(("id", "n0"))
                    .write_inner_content(|writer| {
                        for place in &pn.places {
                            writer
                                .create_element("place")
                                .with_attribute(("id", place.id.as_str()))
                                .write_inner_content(|writer| {
                                    write_text_element(writer, "name", &place.name)?;
                                    write_text_element(
                                        writer,
                                        "initialMarking",
                                        &place.initial_marking.to_string(),
                                    )?;
                                    if let Some(tokens) = place.final_marking {
                                        write_text_element(
                                            writer,
                                            "finalMarking",
                                            &tokens.to_string(),
                                        )?;
                                    }
                                    write_text_element(writer, "type", place.kind.as_str())?;
                                    OK
                                })?;
                        }
                        for transition in &pn.transitions {
                            writer
                                .create_element("transition")
                                .with_attribute(("id", transition.id.as_str()))
                                .write_inner_content(|writer| {
                                    write_text_element(writer, "name", &transition.name)?;
                                    write_text_element(
                                        writer,
                                        "origname",
                                        &transition.original_name,
                                    )?;
                                    write_text_element(writer, "type", transition.kind.as_str())?;
                                    if pn.invisible_transitions.contains(&transition.id) {
                                        writer
                                            .create_element("toolspecific")
                                            .with_attributes(vec![
                                                ("tool", "ProM"),
                                                ("version", "6.4"),
                                                ("activity", "$invisible$"),
                                                ("localNodeID", transition.id.as_str()),
                                            ])
                                            .write_empty()?;
                                    }
                                    OK
                                })?;
                        }
                        for arc in &pn.arcs {
                            writer
                                .create_element("arc")
                                .with_attributes(vec![
                                    ("id", arc.id.as_str()),
                                    ("source", arc.source.as_str()),
                                    ("target", arc.target.as_str()),
                                ])
                                .write_inner_content(|writer| {
                                    write_text_element(writer, "name", &arc.id)?;
                                    OK
                                })?;
                        }
                        OK
                    })?;

                if !pn.final_marking.is_empty() {
                    writer
                        .create_element("finalmarkings")
                        .write_inner_content(|writer| {
                            writer.create_element("marking").write_inner_content(|writer| {
                                for (place_id, tokens) in &pn.final_marking {
                                    writer
                                        .create_element("place")
                                        .with_attribute(("idref", place_id.as_str()))
                                        .write_inner_content(|writer| {
                                            writer
                                                .create_element("text")
                                                .write_text_content(BytesText::new(
                                                    &tokens.to_string(),
                                                ))?;
                                            OK
                                        })?;
                                }
                                OK
                            })?;
                            OK
                        })?;
                }

                // </net>
                OK
            })?;
        OK
    })?;
    Ok(())
}

/// Export a [`PetriNet`] to a `.pnml` file (specified through path)
///
/// The file is only created once the whole net was written.
/// Also consider using [`PetriNet::export_pnml`] for convenience or [`export_petri_net_to_pnml`] for more control.
pub fn export_petri_net_to_pnml_path<P: AsRef<std::path::Path>>(
    pn: &PetriNet,
    path: P,
) -> crate::Result<()> {
    write_file_atomically(path, |w| {
        export_petri_net_to_pnml(pn, w)?;
        Ok(())
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::petri_net::{
        import_pnml::import_pnml_slice,
        petri_net_struct::{PlaceKind, TransitionKind},
    };

    fn small_net() -> PetriNet {
        let mut pn = PetriNet::new();
        pn.id = "n".into();
        pn.add_place("p0", 1, PlaceKind::Model);
        pn.add_place("logp0", 1, PlaceKind::Log);
        pn.add_transition("t0", "SYNC", TransitionKind::Sync);
        pn.transitions[0].original_name = "a<b".into();
        pn.add_arc("arc0", "p0", "t0");
        pn.add_arc("arc1", "logp0", "t0");
        pn.final_marking = vec![("p0".into(), 0), ("logp0".into(), 1)];
        pn.places[0].final_marking = Some(0);
        pn.places[1].final_marking = Some(1);
        pn
    }

    #[test]
    fn test_export_pnml_to_writer() -> Result<(), quick_xml::Error> {
        let pn = small_net();
        let mut bytes = Vec::new();
        export_petri_net_to_pnml(&pn, &mut bytes)?;
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains(r#"<transition id="t0">"#));
        assert!(xml.contains("<origname>"));
        assert!(xml.contains("a&lt;b"));
        assert!(xml.contains(r#"<place idref="logp0">"#));
        Ok(())
    }

    #[test]
    fn test_export_import_keeps_annotations() {
        let pn = small_net();
        let mut bytes = Vec::new();
        export_petri_net_to_pnml(&pn, &mut bytes).unwrap();
        let back = import_pnml_slice(&bytes).unwrap();
        assert_eq!(back.places, pn.places);
        assert_eq!(back.transitions, pn.transitions);
        assert_eq!(back.arcs, pn.arcs);
        assert_eq!(back.final_marking, pn.final_marking);
    }

    #[test]
    fn test_export_pnml_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.pnml");
        small_net().export_pnml(&path).unwrap();
        let back = PetriNet::load_from_path(&path).unwrap();
        assert_eq!(back.statistics(), small_net().statistics());
    }
}
