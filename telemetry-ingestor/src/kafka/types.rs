use rdkafka::topic_partition_list::TopicPartitionListElem;
use rdkafka::TopicPartitionList;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    topic: String,
    partition_number: i32,
}

impl Partition {
    pub fn new(topic: String, partition_number: i32) -> Self {
        Self {
            topic,
            partition_number,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_number(&self) -> i32 {
        self.partition_number
    }
}

impl From<TopicPartitionListElem<'_>> for Partition {
    fn from(elem: TopicPartitionListElem<'_>) -> Self {
        Self::new(elem.topic().to_string(), elem.partition())
    }
}

/// Collect the partitions named in a rebalance event's partition list.
pub fn partitions_of(list: &TopicPartitionList) -> Vec<Partition> {
    list.elements().into_iter().map(Partition::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::Offset;

    #[test]
    fn collects_partitions_from_a_partition_list() {
        let mut list = TopicPartitionList::new();
        list.add_partition_offset("device-telemetry", 0, Offset::Beginning)
            .unwrap();
        list.add_partition_offset("device-telemetry", 2, Offset::Beginning)
            .unwrap();

        let partitions = partitions_of(&list);

        assert_eq!(
            partitions,
            vec![
                Partition::new("device-telemetry".to_string(), 0),
                Partition::new("device-telemetry".to_string(), 2),
            ]
        );
    }
}
